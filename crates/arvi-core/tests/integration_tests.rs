//! Integration tests for the request lifecycle
//!
//! These tests drive a full `Integration` over the in-memory platform:
//! initialization, issuing operations, correlating completed responses with
//! their callbacks, client-side limits and shutdown.

use std::sync::{Arc, Mutex};

use arvi_core::*;
use arvi_harness::{BoundaryCall, LifecycleCall, MockPlatform, MockTimeSource, ScriptedResponse};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn test_config() -> IntegrationConfig {
    IntegrationConfig::default().with_app_key("test-app-key")
}

fn initialized(platform: &MockPlatform) -> Integration {
    let mut integration = Integration::new(platform.clone(), test_config());
    integration.initialize().unwrap();
    integration
}

/// Collects every response delivered to the callbacks it hands out
#[derive(Clone, Default)]
struct Outcomes(Arc<Mutex<Vec<Response>>>);

impl Outcomes {
    fn callback(&self) -> impl FnOnce(Response) + Send + 'static {
        let outcomes = Arc::clone(&self.0);
        move |response| outcomes.lock().unwrap().push(response)
    }

    fn all(&self) -> Vec<Response> {
        self.0.lock().unwrap().clone()
    }
}

// ----------------------------------------------------------------------------
// Initialization Tests
// ----------------------------------------------------------------------------

#[test]
fn test_initialize_brings_up_modules_in_order() {
    let platform = MockPlatform::new();
    let integration = initialized(&platform);

    assert_eq!(integration.state(), IntegrationState::Initialized);
    assert_eq!(
        platform.lifecycle(),
        vec![
            LifecycleCall::RequestsInitialize,
            LifecycleCall::MessagesInitialize,
            LifecycleCall::SessionVariablesInitialize,
        ]
    );
}

#[test]
fn test_empty_app_key_is_rejected() {
    let platform = MockPlatform::new();
    let mut integration = Integration::new(platform.clone(), IntegrationConfig::default());

    assert!(matches!(integration.initialize(), Err(IntegrationError::EmptyAppKey)));
    assert!(!integration.is_initialized());
    assert!(platform.lifecycle().is_empty());
}

#[test]
fn test_message_module_failure_finalizes_requests() {
    let platform = MockPlatform::new();
    platform.fail_messages_init("queue unavailable");
    let mut integration = Integration::new(platform.clone(), test_config());

    match integration.initialize() {
        Err(IntegrationError::MessagesNotInitialized { reason }) => {
            assert_eq!(reason, "queue unavailable")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        platform.lifecycle().last(),
        Some(&LifecycleCall::RequestsFinalize {
            wait_for_complete: false
        })
    );
}

#[test]
fn test_session_variables_failure_finalizes_earlier_modules() {
    let platform = MockPlatform::new();
    platform.fail_session_variables_init("storage offline");
    let mut integration = Integration::new(platform.clone(), test_config());

    let err = integration.initialize().unwrap_err();
    assert!(matches!(err, IntegrationError::SessionVariablesNotInitialized { .. }));
    assert!(err.to_string().contains("storage offline"));

    let lifecycle = platform.lifecycle();
    assert!(lifecycle.contains(&LifecycleCall::MessagesFinalize));
    assert!(lifecycle.contains(&LifecycleCall::RequestsFinalize {
        wait_for_complete: false
    }));
}

#[test]
fn test_operations_fail_fast_before_initialize() {
    let platform = MockPlatform::new();
    let mut integration = Integration::new(platform.clone(), test_config());
    let outcomes = Outcomes::default();

    let request = integration.server_started();
    assert!(!request.is_valid());
    assert!(request.error_message().unwrap().contains("not initialized"));
    let handle = request.on_complete(outcomes.callback());

    // Delivered synchronously, never reaching the platform
    assert_eq!(handle, CorrelationHandle::INVALID);
    assert!(platform.calls().is_empty());
    let delivered = outcomes.all();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].error().unwrap().code, ErrorCode::Unknown);

    assert_eq!(integration.try_get_players_count(), None);
    assert_eq!(integration.tick(), TickSummary::default());
}

#[test]
fn test_version_appends_integration_version() {
    let platform = MockPlatform::new();
    platform.set_sdk_version("2.4.0");
    let integration = Integration::new(platform, test_config());

    assert_eq!(integration.version(), format!("2.4.0.{}", SDK_INTEGRATION_VERSION));
}

// ----------------------------------------------------------------------------
// Correlation Tests
// ----------------------------------------------------------------------------

#[test]
fn test_callback_fires_once_with_matching_response() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.is_application_entitled().on_complete(outcomes.callback());
    assert!(handle.is_valid());
    assert_eq!(integration.pending_requests(), 1);
    assert_eq!(
        platform.last_call(),
        Some(BoundaryCall::IsApplicationEntitled {
            app_key: "test-app-key".to_string()
        })
    );

    platform.queue_response(ScriptedResponse::success(handle));
    // Duplicate delivery for the same handle is ignored
    platform.queue_response(ScriptedResponse::success(handle));
    assert_eq!(integration.dispatch_responses(), 2);

    let delivered = outcomes.all();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].is_success());
    assert_eq!(delivered[0].request_id(), handle);
    assert_eq!(integration.pending_requests(), 0);
    assert_eq!(integration.response_stats().unmatched, 1);
}

#[test]
fn test_failed_enqueue_resolves_synchronously() {
    let platform = MockPlatform::new();
    platform.set_fail_enqueue(true);
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.call_operator().on_complete(outcomes.callback());

    assert!(!handle.is_valid());
    assert_eq!(integration.pending_requests(), 0);
    let delivered = outcomes.all();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].error().unwrap().code, ErrorCode::Unknown);
}

#[test]
fn test_error_response_carries_platform_code() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.is_application_entitled().on_complete(outcomes.callback());
    platform.queue_response(ScriptedResponse::failure(
        handle,
        ErrorCode::ApiKeyError,
        "unknown application key",
    ));
    integration.tick();

    let delivered = outcomes.all();
    let error = delivered[0].error().unwrap();
    assert_eq!(error.code, ErrorCode::ApiKeyError);
    assert_eq!(error.message, "unknown application key");
}

#[test]
fn test_data_response_payload_is_delivered() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.server_started().on_complete(outcomes.callback());
    platform.queue_response(ScriptedResponse::with_data(handle, b"ready".to_vec()));
    integration.tick();

    let delivered = outcomes.all();
    assert_eq!(delivered[0].response_type(), ResponseType::Data);
    assert_eq!(delivered[0].data_as_string(), "ready");
}

#[test]
fn test_failed_data_fetch_yields_empty_payload() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.server_started().on_complete(outcomes.callback());
    platform.queue_response(
        ScriptedResponse::with_data(handle, vec![1, 2, 3]).with_failing_data_fetch(),
    );
    integration.tick();

    let delivered = outcomes.all();
    assert!(delivered[0].is_success());
    assert!(delivered[0].data().is_empty());
}

#[test]
fn test_unmatched_responses_are_released() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    platform.queue_response(ScriptedResponse::success(CorrelationHandle::new(99)));
    assert_eq!(integration.dispatch_responses(), 1);

    assert_eq!(integration.response_stats().unmatched, 1);
    assert_eq!(platform.freed_responses().len(), 1);
    assert_eq!(platform.live_objects(), 0);
}

#[test]
fn test_detached_request_response_is_dropped() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    let handle = integration.game_completed().detach();
    assert!(handle.is_valid());
    assert_eq!(integration.pending_requests(), 0);

    platform.queue_response(ScriptedResponse::success(handle));
    integration.tick();
    assert_eq!(integration.response_stats().unmatched, 1);
}

#[test]
fn test_panicking_callback_does_not_stop_dispatch() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let first = integration
        .server_started()
        .on_complete(|_| panic!("callback failure"));
    let second = integration.game_completed().on_complete(outcomes.callback());
    platform.queue_response(ScriptedResponse::success(first));
    platform.queue_response(ScriptedResponse::success(second));
    integration.tick();

    assert_eq!(outcomes.all().len(), 1);
    assert_eq!(integration.response_stats().callback_panics, 1);
    assert_eq!(platform.live_objects(), 0);
}

#[test]
fn test_responses_drain_across_ticks_with_small_buffer() {
    let platform = MockPlatform::new();
    platform.set_auto_complete(true);
    let config = test_config().with_dispatch(DispatchConfig::testing());
    let mut integration = Integration::new(platform.clone(), config);
    integration.initialize().unwrap();
    let outcomes = Outcomes::default();

    for i in 0..10 {
        integration
            .send_log_message(&format!("entry {}", i))
            .on_complete(outcomes.callback());
    }

    assert_eq!(integration.dispatch_responses(), 4);
    assert_eq!(integration.dispatch_responses(), 4);
    assert_eq!(integration.dispatch_responses(), 2);
    assert_eq!(integration.dispatch_responses(), 0);
    assert_eq!(outcomes.all().len(), 10);
    assert_eq!(platform.invalid_frees(), 0);
}

// ----------------------------------------------------------------------------
// Operation Tests
// ----------------------------------------------------------------------------

#[test]
fn test_batch_commands_keep_order() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    integration
        .activate_in_game_commands(&["jump", "crouch", "reload"])
        .detach();
    let names = vec!["b".to_string(), "a".to_string()];
    integration.deactivate_in_game_commands(&names).detach();

    let calls: Vec<BoundaryCall> = platform.calls().into_iter().map(|(_, call)| call).collect();
    assert_eq!(
        calls,
        vec![
            BoundaryCall::ActivateInGameCommands(vec![
                "jump".to_string(),
                "crouch".to_string(),
                "reload".to_string()
            ]),
            BoundaryCall::DeactivateInGameCommands(vec!["b".to_string(), "a".to_string()]),
        ]
    );
}

#[test]
fn test_game_message_is_forwarded_with_group() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    integration.send_game_message("round over", "scores").detach();
    integration.set_audio_chat_channel(AudioChatChannel::Channel3).detach();

    let calls = platform.calls();
    assert_eq!(
        calls[0].1,
        BoundaryCall::SendGameMessage {
            message: "round over".to_string(),
            group: "scores".to_string()
        }
    );
    assert_eq!(calls[1].1, BoundaryCall::SetAudioChatChannel(AudioChatChannel::Channel3));
}

#[test]
fn test_setters_update_cached_identity() {
    let platform = MockPlatform::new();
    platform.set_player_name_value(Some("Alice"));
    platform.set_dominant_hand_value(Some(DominantHand::Left));
    let mut integration = initialized(&platform);
    assert_eq!(integration.player_name(), "Alice");
    assert_eq!(integration.dominant_hand(), DominantHand::Left);

    integration.set_player_name("Bob").detach();
    integration.set_player_dominant_hand(DominantHand::Right).detach();

    assert_eq!(integration.player_name(), "Bob");
    assert_eq!(integration.dominant_hand(), DominantHand::Right);
}

#[test]
fn test_rejected_setter_leaves_cache_untouched() {
    let platform = MockPlatform::new();
    platform.set_player_name_value(Some("Alice"));
    let mut integration = initialized(&platform);

    platform.set_fail_enqueue(true);
    integration.set_player_name("Mallory").detach();
    assert_eq!(integration.player_name(), "Alice");
}

#[test]
fn test_session_value_round_trip_through_platform() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    integration.set_session_value("score", &1250i32).detach();
    integration.set_session_value("nickname", &"Ace".to_string()).detach();
    integration.set_session_value("ready", &true).detach();

    assert_eq!(platform.session_data("score"), Some(1250i32.to_le_bytes().to_vec()));
    assert_eq!(integration.try_get_session_value::<i32>("score"), Some(1250));
    assert_eq!(
        integration.try_get_session_value::<String>("nickname").as_deref(),
        Some("Ace")
    );
    assert_eq!(integration.try_get_session_value::<bool>("ready"), Some(true));

    // Wrong width and missing names are both reported as absent
    assert_eq!(integration.try_get_session_value::<i64>("score"), None);
    assert_eq!(integration.try_get_session_value::<i32>("missing"), None);
}

#[test]
fn test_empty_session_data_is_present() {
    let platform = MockPlatform::new();
    platform.insert_session_data("flags", &[]);
    let integration = initialized(&platform);

    let variable = integration.try_get_session_data("flags").unwrap();
    assert!(variable.is_empty());
    assert_eq!(variable.name(), "flags");
}

#[test]
fn test_string_and_integer_queries() {
    let platform = MockPlatform::new();
    platform.set_server_ip(Some("192.168.1.20"));
    platform.set_session_language(Some("de"));
    platform.set_session_id(Some("session-42"));
    platform.set_player_id(Some("player-7"));
    platform.set_players_count(Some(4));
    platform.set_session_time(Some(1800));
    platform.set_play_area_modes(Some(1), None);
    platform.insert_ui_setting("difficulty", " 3 ");
    let integration = initialized(&platform);

    assert_eq!(integration.try_get_server_ip().as_deref(), Some("192.168.1.20"));
    assert_eq!(integration.try_get_session_language().as_deref(), Some("de"));
    assert_eq!(integration.try_get_session_id().as_deref(), Some("session-42"));
    assert_eq!(integration.try_get_player_id().as_deref(), Some("player-7"));
    assert_eq!(integration.try_get_players_count(), Some(4));
    assert_eq!(integration.try_get_session_time(), Some(1800));
    assert_eq!(integration.try_get_play_area_checking_mode(), Some(1));
    assert_eq!(integration.try_get_play_area_out_of_bounds_mode(), None);
    assert_eq!(integration.try_get_ui_setting_as::<u8>("difficulty"), Some(3));
    assert_eq!(integration.try_get_ui_setting("missing"), None);
}

// ----------------------------------------------------------------------------
// Launch Flag Tests
// ----------------------------------------------------------------------------

#[test]
fn test_trial_mode_follows_platform_or_flag() {
    let platform = MockPlatform::new();
    let integration = initialized(&platform);
    assert!(!integration.is_application_in_trial_mode());

    platform.set_trial_mode(true);
    assert!(integration.is_application_in_trial_mode());

    let forced = test_config().with_launch_options(LaunchOptions::from_args(["game.exe", "-TRIAL"]));
    let integration = Integration::new(MockPlatform::new(), forced);
    assert!(integration.is_application_in_trial_mode());
}

#[test]
fn test_cord_twist_tracking_can_be_disabled() {
    let platform = MockPlatform::new();
    let integration = Integration::new(platform.clone(), test_config());
    // Defaults to tracking before initialization
    assert!(integration.should_application_track_cord_twisting());

    let integration = initialized(&platform);
    platform.set_track_cord_twisting(false);
    assert!(!integration.should_application_track_cord_twisting());

    let disabled = test_config().with_launch_options(LaunchOptions {
        disable_cord_twist_tracking: true,
        ..LaunchOptions::default()
    });
    platform.set_track_cord_twisting(true);
    let mut integration = Integration::new(platform, disabled);
    integration.initialize().unwrap();
    assert!(!integration.should_application_track_cord_twisting());
}

// ----------------------------------------------------------------------------
// Limit Tests
// ----------------------------------------------------------------------------

#[test]
fn test_overlong_command_is_rejected_locally() {
    let platform = MockPlatform::new();
    let config = test_config().with_limits(LimitsConfig::strict());
    let mut integration = Integration::new(platform.clone(), config);
    integration.initialize().unwrap();

    let request = integration.activate_in_game_command(&"x".repeat(129));
    assert!(!request.is_valid());
    assert!(platform.calls().is_empty());

    integration.activate_in_game_command(&"x".repeat(128)).detach();
    assert_eq!(platform.calls().len(), 1);
}

#[test]
fn test_warning_rate_window_slides() {
    let platform = MockPlatform::new();
    let clock = MockTimeSource::new_at(10_000);
    let config = test_config().with_limits(LimitsConfig::strict());
    let mut integration = Integration::new(platform.clone(), config).with_time_source(clock.clone());
    integration.initialize().unwrap();

    assert!(integration.send_warning_message("first").is_valid());
    let limited = integration.send_warning_message("second");
    assert!(!limited.is_valid());
    assert!(limited.error_message().unwrap().contains("WarningMessage"));

    clock.advance(1_001);
    assert!(integration.send_warning_message("third").is_valid());
    assert_eq!(platform.calls().len(), 2);
}

#[test]
fn test_limits_are_off_by_default() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    for _ in 0..20 {
        integration.send_warning_message("ping").detach();
    }
    integration.send_log_message(&"y".repeat(20_000)).detach();
    assert_eq!(platform.calls().len(), 21);
}

// ----------------------------------------------------------------------------
// Shutdown Tests
// ----------------------------------------------------------------------------

#[test]
fn test_shutdown_abandons_pending_callbacks() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);
    let outcomes = Outcomes::default();

    let handle = integration.server_started().on_complete(outcomes.callback());
    integration.shutdown();

    assert_eq!(integration.state(), IntegrationState::ShutDown);
    assert_eq!(integration.pending_requests(), 0);

    platform.queue_response(ScriptedResponse::success(handle));
    assert_eq!(integration.tick(), TickSummary::default());
    assert!(outcomes.all().is_empty());
}

#[test]
fn test_shutdown_finalizes_once_in_order() {
    let platform = MockPlatform::new();
    let mut integration = initialized(&platform);

    integration.shutdown_with(true);
    integration.shutdown();
    drop(integration);

    assert_eq!(
        platform.lifecycle()[3..],
        [
            LifecycleCall::RequestsFinalize {
                wait_for_complete: true
            },
            LifecycleCall::MessagesFinalize,
            LifecycleCall::SessionVariablesFinalize,
        ]
    );
}

#[test]
fn test_drop_shuts_down() {
    let platform = MockPlatform::new();
    drop(initialized(&platform));

    assert_eq!(platform.lifecycle().len(), 6);
    assert_eq!(platform.lifecycle().last(), Some(&LifecycleCall::SessionVariablesFinalize));
}
