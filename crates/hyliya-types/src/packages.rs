use serde::Serialize;

/// A purchasable premium package. Prices are VND (PayOS settles in VND).
#[derive(Debug, Clone, Serialize)]
pub struct PremiumPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub days: i64,
    pub amount: i64,
}

/// Static catalog. The billing flow looks packages up by id; the id is also
/// persisted on the invoice so a webhook can resolve the duration later.
pub const PACKAGES: &[PremiumPackage] = &[
    PremiumPackage {
        id: "premium_1m",
        name: "Premium 1 tháng",
        days: 30,
        amount: 79_000,
    },
    PremiumPackage {
        id: "premium_3m",
        name: "Premium 3 tháng",
        days: 90,
        amount: 199_000,
    },
    PremiumPackage {
        id: "premium_12m",
        name: "Premium 12 tháng",
        days: 365,
        amount: 599_000,
    },
];

pub fn find(id: &str) -> Option<&'static PremiumPackage> {
    PACKAGES.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        assert_eq!(find("premium_1m").unwrap().days, 30);
        assert!(find("premium_99m").is_none());
    }
}
