use donation_service::config::{
    BankVerifyConfig, CacheConfig, Config, DatabaseConfig, ServerConfig, StripeConfig,
};
use donation_service::models::{Campaign, CampaignStatus, Donation};
use donation_service::services::StripeClient;
use donation_service::Application;
use futures::TryStreamExt;
use mongodb::bson::doc;
use secrecy::Secret;
use uuid::Uuid;
use wiremock::MockServer;

pub const TEST_ADMIN_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
    pub db_name: String,
    pub config: Config,
    pub stripe_mock: MockServer,
    pub bank_mock: MockServer,
}

impl TestApp {
    /// Spawn the service against a per-test database, with wiremock
    /// standing in for the card and bank-verification providers and the
    /// cache disabled.
    pub async fn spawn() -> Self {
        Self::spawn_inner(true, false).await
    }

    /// Spawn with the cache backend enabled (requires a reachable Redis).
    pub async fn spawn_with_cache() -> Self {
        Self::spawn_inner(true, true).await
    }

    /// Spawn with neither payment provider configured.
    pub async fn spawn_without_providers() -> Self {
        Self::spawn_inner(false, false).await
    }

    async fn spawn_inner(with_providers: bool, with_cache: bool) -> Self {
        let stripe_mock = MockServer::start().await;
        let bank_mock = MockServer::start().await;

        let db_name = format!("donation_test_{}", Uuid::new_v4().simple());

        let (secret_key, webhook_secret, bank_base_url, ocr_url) = if with_providers {
            (
                "sk_test_123".to_string(),
                "whsec_test".to_string(),
                bank_mock.uri(),
                format!("{}/ocr", bank_mock.uri()),
            )
        } else {
            (String::new(), String::new(), String::new(), String::new())
        };

        let cache_url = if with_cache {
            Some(Secret::new(
                std::env::var("TEST_REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ))
        } else {
            None
        };

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            database: DatabaseConfig {
                url: Secret::new(
                    std::env::var("TEST_MONGODB_URI")
                        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                ),
                db_name: db_name.clone(),
            },
            cache: CacheConfig {
                url: cache_url,
                queue: None,
                ttl_seconds: 300,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(secret_key),
                webhook_secret: Secret::new(webhook_secret),
                api_base_url: stripe_mock.uri(),
                signature_tolerance_secs: 300,
            },
            bank_verify: BankVerifyConfig {
                base_url: bank_base_url,
                ocr_url,
                api_key: Secret::new("test-api-key".to_string()),
            },
            currency: "usd".to_string(),
            service_name: "donation-service-test".to_string(),
        };

        let app = Application::build(config.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept requests.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            config,
            stripe_mock,
            bank_mock,
        }
    }

    /// Insert a campaign directly, owned by a fresh organizer.
    pub async fn seed_campaign(&self, status: CampaignStatus, goal: f64, raised: f64) -> Campaign {
        self.seed_campaign_owned(Uuid::new_v4(), status, goal, raised)
            .await
    }

    /// Insert a campaign directly with a known organizer.
    pub async fn seed_campaign_owned(
        &self,
        organizer_id: Uuid,
        status: CampaignStatus,
        goal: f64,
        raised: f64,
    ) -> Campaign {
        let now = mongodb::bson::DateTime::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            title: "Clean water for Arba Minch".to_string(),
            category: "health".to_string(),
            description: "Drill two wells serving four villages.".to_string(),
            goal_amount: goal,
            raised_amount: raised,
            status,
            bank_account: "1000222233334444".to_string(),
            organizer_id,
            is_success_story: false,
            goal_reached_at: None,
            featured: false,
            created_at: now,
            updated_at: now,
        };

        self.db
            .collection::<Campaign>("campaigns")
            .insert_one(campaign.clone(), None)
            .await
            .expect("Failed to seed campaign");

        campaign
    }

    pub async fn get_campaign(&self, id: &Uuid) -> Campaign {
        self.db
            .collection::<Campaign>("campaigns")
            .find_one(doc! { "_id": id.to_string() }, None)
            .await
            .expect("Failed to read campaign")
            .expect("Campaign not found")
    }

    pub async fn donations_for(&self, campaign_id: &Uuid) -> Vec<Donation> {
        self.db
            .collection::<Donation>("donations")
            .find(doc! { "campaign_id": campaign_id.to_string() }, None)
            .await
            .expect("Failed to query donations")
            .try_collect()
            .await
            .expect("Failed to collect donations")
    }

    /// Produce a valid `Stripe-Signature` header for a webhook body.
    pub fn sign_webhook(&self, body: &str) -> String {
        StripeClient::new(self.config.stripe.clone())
            .sign_webhook_payload(body, chrono::Utc::now().timestamp())
            .expect("Failed to sign webhook payload")
    }

    /// Cleanup test database after test completes.
    pub async fn cleanup(&self) {
        self.db
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }
}

/// A succeeded payment-intent webhook event body.
pub fn succeeded_event(intent_id: &str, amount_minor: i64) -> String {
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "amount": amount_minor,
                "currency": "usd",
                "status": "succeeded"
            }
        }
    })
    .to_string()
}

/// A failed payment-intent webhook event body.
pub fn failed_event(intent_id: &str) -> String {
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.payment_failed",
        "data": {
            "object": {
                "id": intent_id,
                "amount": 0,
                "currency": "usd",
                "status": "requires_payment_method"
            }
        }
    })
    .to_string()
}

/// A payment-intent response body as the card provider would return it.
pub fn payment_intent_body(intent_id: &str, amount_minor: i64) -> serde_json::Value {
    serde_json::json!({
        "id": intent_id,
        "client_secret": format!("{}_secret_abc", intent_id),
        "amount": amount_minor,
        "currency": "usd",
        "status": "requires_payment_method"
    })
}
