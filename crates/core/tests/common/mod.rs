#![allow(dead_code)]

use capture::{CaptureFlags, ComponentName, CoordinatorConfig, LifecycleToken, RemoteMessage, SessionCoordinator};
use capture_runtime::{FakeTransportBuilder, FakeTransportController};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// Coordinator wired to a fake service, with its worker already running.
pub fn harness(config: CoordinatorConfig) -> (SessionCoordinator, FakeTransportController) {
	init_tracing();
	let (parts, controller) = FakeTransportBuilder::new().build();
	let coordinator = SessionCoordinator::spawn(config, Some(parts));
	(coordinator, controller)
}

pub fn start_scope(coordinator: &SessionCoordinator, token: &str) {
	coordinator.on_scope_started(
		LifecycleToken::new(token),
		ComponentName::new("com.example.app", format!("com.example.app.{token}")),
		CaptureFlags::empty(),
	);
}

/// Compact rendering of sent traffic for order assertions.
pub fn render(messages: &[RemoteMessage]) -> Vec<String> {
	messages
		.iter()
		.map(|message| match message {
			RemoteMessage::SessionStarted { token, .. } => format!("start({token})"),
			RemoteMessage::SendEvents { events, .. } => {
				let kinds: Vec<&str> = events.iter().map(|event| event.kind.as_str()).collect();
				format!("events[{}]", kinds.join(","))
			}
			RemoteMessage::SessionFinished { session_id } => format!("finish({})", session_id.0),
			RemoteMessage::RemoveUserData { request } => format!("remove({})", request.package_name),
			RemoteMessage::Query { query, .. } => format!("query({query})"),
		})
		.collect()
}
