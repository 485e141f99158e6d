mod common;

use std::time::Duration;

use capture::{ComponentName, CoordinatorConfig, Error, RemoteMessage, SessionCoordinator, UserDataRemovalRequest};
use capture_protocol::{CorrelationId, Query, QueryReply, QueryResponse};
use common::{harness, init_tracing, render};
use tokio::time::Instant;

fn sent_query_ids(sent: &[RemoteMessage]) -> Vec<CorrelationId> {
	sent.iter()
		.filter_map(|message| match message {
			RemoteMessage::Query { correlation_id, .. } => Some(*correlation_id),
			_ => None,
		})
		.collect()
}

#[tokio::test]
async fn test_query_remote_flag_state_round_trip() -> anyhow::Result<()> {
	let (coordinator, controller) = harness(CoordinatorConfig::default());
	controller.reply_to(Query::FeatureEnabled, QueryReply::FeatureEnabled(true));

	assert!(coordinator.query_remote_flag_state().await?);
	assert!(coordinator.is_capture_feature_enabled().await?);
	assert_eq!(coordinator.pending_calls(), 0);
	assert_eq!(
		render(&controller.take_sent().await),
		vec!["query(feature_enabled)", "query(feature_enabled)"]
	);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_query_times_out_and_late_reply_is_dropped() {
	let timeout = Duration::from_millis(200);
	let (coordinator, controller) = harness(CoordinatorConfig::default().with_sync_call_timeout(timeout));

	let started = Instant::now();
	let err = coordinator.query_remote_flag_state().await.unwrap_err();
	let elapsed = started.elapsed();

	assert!(err.is_timeout(), "expected timeout, got {err:?}");
	assert!(elapsed >= timeout);
	assert!(elapsed < timeout + Duration::from_millis(50));
	assert_eq!(coordinator.pending_calls(), 0);

	let late_ids = sent_query_ids(&controller.take_sent().await);
	assert_eq!(late_ids.len(), 1);
	controller.inject_response(QueryResponse::ok(late_ids[0], QueryReply::FeatureEnabled(true)));
	tokio::time::sleep(Duration::from_millis(10)).await;

	controller.reply_to(Query::FeatureEnabled, QueryReply::FeatureEnabled(false));
	assert!(!coordinator.query_remote_flag_state().await.unwrap());

	let fresh_ids = sent_query_ids(&controller.take_sent().await);
	assert_eq!(fresh_ids.len(), 1);
	assert_ne!(fresh_ids[0], late_ids[0]);
	assert_eq!(coordinator.pending_calls(), 0);
}

#[tokio::test]
async fn test_unconfigured_coordinator_short_circuits() {
	init_tracing();
	let coordinator = SessionCoordinator::spawn(CoordinatorConfig::default(), None);

	assert!(!coordinator.is_enabled());
	assert!(matches!(coordinator.query_remote_flag_state().await, Err(Error::NotConfigured)));
	assert!(!coordinator.is_capture_feature_enabled().await.unwrap());
	assert_eq!(coordinator.service_component_name().await.unwrap(), None);

	let request = UserDataRemovalRequest::builder("com.example.app").forget_everything().build();
	assert!(matches!(coordinator.remove_user_data(request).await, Err(Error::NotConfigured)));
	assert_eq!(coordinator.pending_calls(), 0);
	assert!(coordinator.dump("").contains("No sessions"));
}

#[tokio::test]
async fn test_query_send_failure_is_reported() {
	let (coordinator, controller) = harness(CoordinatorConfig::default());
	controller.reply_to(Query::FeatureEnabled, QueryReply::FeatureEnabled(true));
	controller.fail_sends(true);

	let err = coordinator.query_remote_flag_state().await.unwrap_err();
	assert!(matches!(err, Error::TransportFailure(_)), "got {err:?}");
	assert_eq!(coordinator.pending_calls(), 0);
}

#[tokio::test]
async fn test_remote_error_reply_is_propagated() {
	let (coordinator, controller) = harness(CoordinatorConfig::default().with_sync_call_timeout(Duration::from_secs(5)));

	let query = tokio::spawn({
		let coordinator = std::sync::Arc::new(coordinator);
		async move { coordinator.query_remote_flag_state().await }
	});

	let id = loop {
		if let Some(id) = sent_query_ids(&controller.sent().await).first().copied() {
			break id;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	};
	controller.inject_response(QueryResponse::err(id, "caller not allowed"));

	match query.await.unwrap() {
		Err(Error::Remote(message)) => assert_eq!(message, "caller not allowed"),
		other => panic!("Expected Remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn test_mismatched_reply_kind_is_rejected() {
	let (coordinator, controller) = harness(CoordinatorConfig::default());
	controller.reply_to(Query::FeatureEnabled, QueryReply::ServiceComponentName(None));

	let err = coordinator.query_remote_flag_state().await.unwrap_err();
	assert!(matches!(
		err,
		Error::UnexpectedReply {
			expected: "feature_enabled",
			actual: "service_component_name"
		}
	));
}

#[tokio::test]
async fn test_service_component_name_respects_enablement() -> anyhow::Result<()> {
	let (coordinator, controller) = harness(CoordinatorConfig::default());
	let service = ComponentName::new("com.example.capture", "com.example.capture.Service");
	controller.reply_to(Query::ServiceComponentName, QueryReply::ServiceComponentName(Some(service.clone())));

	assert_eq!(coordinator.service_component_name().await?, Some(service));

	coordinator.set_enabled(false);
	assert_eq!(coordinator.service_component_name().await?, None);
	assert_eq!(render(&controller.take_sent().await), vec!["query(service_component_name)"]);
	Ok(())
}

#[tokio::test]
async fn test_remove_user_data_forwards_and_reports_failure() {
	let (coordinator, controller) = harness(CoordinatorConfig::default());
	let request = UserDataRemovalRequest::builder("com.example.app").add_locus("chat/42", true).build();

	coordinator.remove_user_data(request.clone()).await.unwrap();
	assert_eq!(
		controller.take_sent().await,
		vec![RemoteMessage::RemoveUserData { request: request.clone() }]
	);

	controller.fail_sends(true);
	let err = coordinator.remove_user_data(request).await.unwrap_err();
	assert!(err.is_transport_failure(), "got {err:?}");
}

#[tokio::test]
async fn test_remove_user_data_rejects_empty_request() {
	let (coordinator, controller) = harness(CoordinatorConfig::default());

	let err = coordinator
		.remove_user_data(UserDataRemovalRequest::builder("com.example.app").build())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::InvalidRequest(_)));
	assert!(controller.take_sent().await.is_empty());
}
