use std::sync::Arc;

use hyliya_db::Database;
use hyliya_gateway::dispatcher::Dispatcher;
use hyliya_payos::PayosClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// None when PayOS credentials are not configured — billing endpoints
    /// then answer 503 instead of the whole service refusing to start.
    pub payos: Option<PayosClient>,
    pub payment_return_url: String,
    pub payment_cancel_url: String,
}
