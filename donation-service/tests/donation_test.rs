mod common;

use common::{failed_event, payment_intent_body, succeeded_event, TestApp};
use donation_service::models::{CampaignStatus, DonationStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn checkout_creates_pending_donation() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_1", 5000)))
        .mount(&app.stripe_mock)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .expect("Failed to send checkout request");

    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["clientSecret"], "pi_1_secret_abc");

    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations.len(), 1);
    assert_eq!(donations[0].status, DonationStatus::Pending);
    assert_eq!(donations[0].provider_ref.as_deref(), Some("pi_1"));

    // No campaign mutation before confirmation.
    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 0.0);

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_against_draft_campaign_is_rejected() {
    let app = TestApp::spawn().await;
    let campaign = app.seed_campaign(CampaignStatus::Draft, 1000.0, 0.0).await;

    let response = reqwest::Client::new()
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");

    assert!(app.donations_for(&campaign.id).await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_rejects_non_positive_amount() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    for amount in [0.0, -10.0] {
        let response = reqwest::Client::new()
            .post(format!("{}/donations/checkout", app.address))
            .json(&serde_json::json!({ "campaignId": campaign.id, "amount": amount }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_AMOUNT");
    }

    assert!(app.donations_for(&campaign.id).await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_unknown_campaign_is_not_found() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({
            "campaignId": uuid::Uuid::new_v4(),
            "amount": 50.0
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn checkout_without_provider_is_unavailable() {
    let app = TestApp::spawn_without_providers().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PROVIDER_UNAVAILABLE");

    app.cleanup().await;
}

#[tokio::test]
async fn succeeded_webhook_settles_donation() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_2", 7500)))
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 75.0 }))
        .send()
        .await
        .unwrap();

    let body = succeeded_event("pi_2", 7500);
    let response = client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", app.sign_webhook(&body))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["received"], true);

    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations[0].status, DonationStatus::Succeeded);

    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 75.0);
    assert!(!campaign.is_success_story);

    app.cleanup().await;
}

#[tokio::test]
async fn replayed_webhook_increments_exactly_once() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_3", 5000)))
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap();

    let body = succeeded_event("pi_3", 5000);
    for _ in 0..3 {
        let response = client
            .post(format!("{}/donations/webhook", app.address))
            .header("Stripe-Signature", app.sign_webhook(&body))
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 50.0);

    app.cleanup().await;
}

#[tokio::test]
async fn invalid_webhook_signature_changes_nothing() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_4", 5000)))
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap();

    let body = succeeded_event("pi_4", 5000);

    // Wrong signature.
    let response = client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", "t=1,v1=deadbeef")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Missing header entirely.
    let response = client
        .post(format!("{}/donations/webhook", app.address))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations[0].status, DonationStatus::Pending);
    assert_eq!(app.get_campaign(&campaign.id).await.raised_amount, 0.0);

    app.cleanup().await;
}

#[tokio::test]
async fn failed_webhook_marks_donation_failed() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_5", 5000)))
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap();

    let body = failed_event("pi_5");
    let response = client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", app.sign_webhook(&body))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations[0].status, DonationStatus::Failed);
    assert_eq!(app.get_campaign(&campaign.id).await.raised_amount, 0.0);

    // A late success replay for a failed donation must not settle it.
    let late_success = succeeded_event("pi_5", 5000);
    client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", app.sign_webhook(&late_success))
        .body(late_success.clone())
        .send()
        .await
        .unwrap();

    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations[0].status, DonationStatus::Failed);
    assert_eq!(app.get_campaign(&campaign.id).await.raised_amount, 0.0);

    app.cleanup().await;
}

#[tokio::test]
async fn goal_crossing_sets_success_flag_once() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 950.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_6", 7500)))
        .up_to_n_times(1)
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 75.0 }))
        .send()
        .await
        .unwrap();

    let body = succeeded_event("pi_6", 7500);
    client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", app.sign_webhook(&body))
        .body(body)
        .send()
        .await
        .unwrap();

    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 1025.0);
    assert!(campaign.is_success_story);
    assert!(campaign.goal_reached_at.is_some());
    let first_reached_at = campaign.goal_reached_at;

    // Another settlement after the goal must not reset the timestamp.
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_7", 1000)))
        .mount(&app.stripe_mock)
        .await;
    client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 10.0 }))
        .send()
        .await
        .unwrap();
    let body = succeeded_event("pi_7", 1000);
    client
        .post(format!("{}/donations/webhook", app.address))
        .header("Stripe-Signature", app.sign_webhook(&body))
        .body(body)
        .send()
        .await
        .unwrap();

    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 1035.0);
    assert_eq!(campaign.goal_reached_at, first_reached_at);

    app.cleanup().await;
}

#[tokio::test]
async fn concurrent_settlements_preserve_the_sum() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 10_000.0, 0.0)
        .await;

    let client = reqwest::Client::new();
    let amounts = [(("pi_a"), 25.0), (("pi_b"), 40.0), (("pi_c"), 35.0)];

    for (intent_id, amount) in amounts {
        Mock::given(method("POST"))
            .and(path("/payment_intents"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(payment_intent_body(intent_id, (amount * 100.0) as i64)),
            )
            .up_to_n_times(1)
            .mount(&app.stripe_mock)
            .await;

        client
            .post(format!("{}/donations/checkout", app.address))
            .json(&serde_json::json!({ "campaignId": campaign.id, "amount": amount }))
            .send()
            .await
            .unwrap();
    }

    // Settle all three concurrently.
    let donations = app.donations_for(&campaign.id).await;
    assert_eq!(donations.len(), 3);
    let mut handles = Vec::new();
    for donation in &donations {
        let body = succeeded_event(donation.provider_ref.as_deref().unwrap(), 0);
        let signature = app.sign_webhook(&body);
        let url = format!("{}/donations/webhook", app.address);
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .header("Stripe-Signature", signature)
                .body(body)
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    let campaign = app.get_campaign(&campaign.id).await;
    assert_eq!(campaign.raised_amount, 100.0);

    app.cleanup().await;
}

#[tokio::test]
async fn get_donation_returns_status() {
    let app = TestApp::spawn().await;
    let campaign = app
        .seed_campaign(CampaignStatus::Approved, 1000.0, 0.0)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payment_intent_body("pi_8", 5000)))
        .mount(&app.stripe_mock)
        .await;

    let client = reqwest::Client::new();
    let checkout: serde_json::Value = client
        .post(format!("{}/donations/checkout", app.address))
        .json(&serde_json::json!({ "campaignId": campaign.id, "amount": 50.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .get(format!(
            "{}/donations/{}",
            app.address,
            checkout["donationId"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["provider"], "CARD");

    app.cleanup().await;
}
