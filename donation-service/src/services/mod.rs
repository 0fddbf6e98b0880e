pub mod bank_verify;
pub mod cache;
pub mod metrics;
pub mod reconciliation;
pub mod repository;
pub mod stripe;

pub use bank_verify::BankVerifyClient;
pub use cache::CampaignCache;
pub use metrics::{get_metrics, init_metrics};
pub use reconciliation::ReconciliationService;
pub use repository::PlatformRepository;
pub use stripe::StripeClient;
