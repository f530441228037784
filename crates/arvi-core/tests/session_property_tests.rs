//! Property-based tests for session storage, probing and rate windows
//!
//! These tests verify invariants of the session value codec, the two-call
//! fetch protocol against the in-memory platform, and the sliding windows
//! that bound outgoing operations.

use std::sync::{Arc, Mutex};

use arvi_core::*;
use arvi_harness::{MockPlatform, MockTimeSource, ScriptedResponse};
use proptest::prelude::*;

/// Generate an arbitrary session variable name
fn arb_name() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-zA-Z_][a-zA-Z0-9_.]{0,63}").unwrap()
}

/// Generate arbitrary stored bytes, including the empty buffer
fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Generate text without NUL, which the platform uses as a terminator
fn arb_text() -> impl Strategy<Value = String> {
    any::<String>().prop_map(|s| s.replace('\0', ""))
}

/// Generate gaps between consecutive operations, in milliseconds
fn arb_gaps() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..400, 1..120)
}

fn initialized(platform: &MockPlatform) -> Integration {
    let mut integration = Integration::new(
        platform.clone(),
        IntegrationConfig::default().with_app_key("property-key"),
    );
    integration.initialize().unwrap();
    integration
}

fn round_trips<T: SessionValue + PartialEq + std::fmt::Debug>(value: T) -> bool {
    value.encode().and_then(|bytes| T::decode(&bytes)) == Ok(value)
}

#[test]
fn boundary_values_round_trip() {
    assert!(round_trips(i16::MIN) && round_trips(i16::MAX) && round_trips(u16::MAX));
    assert!(round_trips(i32::MIN) && round_trips(u32::MAX) && round_trips(0u32));
    assert!(round_trips(i64::MIN) && round_trips(u64::MAX));
    assert!(round_trips(f32::MIN) && round_trips(f64::MAX) && round_trips(-0.0f64));
    assert!(round_trips(String::new()) && round_trips(Vec::<u8>::new()));
    assert!(round_trips('\u{FFFF}') && round_trips(false));
}

proptest! {
    /// Property: stored values decode to what was encoded, whatever the type
    #[test]
    fn session_values_round_trip(
        a in any::<i16>(),
        b in any::<u32>(),
        c in any::<i64>(),
        d in any::<f64>().prop_filter("NaN never equals itself", |v| !v.is_nan()),
        text in any::<String>(),
    ) {
        prop_assert!(round_trips(a));
        prop_assert!(round_trips(b));
        prop_assert!(round_trips(c));
        prop_assert!(round_trips(d));
        prop_assert!(round_trips(text));
    }

    /// Property: fixed-width decoding accepts exactly its own width
    #[test]
    fn fixed_width_decode_checks_length(bytes in prop::collection::vec(any::<u8>(), 0..16)) {
        let decoded = i32::decode(&bytes);
        if bytes.len() == 4 {
            prop_assert!(decoded.is_ok());
        } else {
            prop_assert_eq!(
                decoded,
                Err(CodecError::LengthMismatch { type_name: "i32", expected: 4, actual: bytes.len() })
            );
        }
        prop_assert_eq!(f64::decode(&bytes).is_ok(), bytes.len() == 8);
    }

    /// Property: only 0 and 1 decode as booleans
    #[test]
    fn bool_decode_is_strict(byte in any::<u8>()) {
        match bool::decode(&[byte]) {
            Ok(value) => prop_assert_eq!(u8::from(value), byte),
            Err(e) => {
                prop_assert!(byte > 1);
                prop_assert_eq!(e, CodecError::InvalidBool(byte));
            }
        }
    }

    /// Property: a char encodes iff it fits one UTF-16 unit, and decodes back
    #[test]
    fn char_encoding_fits_one_unit(c in any::<char>()) {
        match c.encode() {
            Ok(bytes) => {
                prop_assert_eq!(bytes.len(), 2);
                prop_assert_eq!(char::decode(&bytes), Ok(c));
            }
            Err(e) => {
                prop_assert!(c.len_utf16() == 2);
                prop_assert_eq!(e, CodecError::CharOutOfRange(u32::from(c)));
            }
        }
    }

    /// Property: stored bytes are read back exactly through the two-call protocol
    #[test]
    fn session_data_survives_probe_protocol(name in arb_name(), payload in arb_payload()) {
        let platform = MockPlatform::new();
        let mut integration = initialized(&platform);

        integration.set_session_data(&name, &payload).detach();
        let variable = integration.try_get_session_data(&name);

        prop_assert!(variable.is_some());
        let variable = variable.unwrap();
        prop_assert_eq!(variable.name(), name.as_str());
        prop_assert_eq!(variable.data(), payload.as_slice());
    }

    /// Property: UTF-16 strings come back unchanged, terminator stripped
    #[test]
    fn ui_settings_survive_probe_protocol(name in arb_name(), value in arb_text()) {
        let platform = MockPlatform::new();
        platform.insert_ui_setting(&name, &value);
        let integration = initialized(&platform);

        prop_assert_eq!(integration.try_get_ui_setting(&name), Some(value));
    }

    /// Property: every registered callback fires exactly once, whatever the completion order
    #[test]
    fn callbacks_fire_once_in_any_order(
        order in Just((0..16usize).collect::<Vec<_>>()).prop_shuffle(),
        duplicates in prop::collection::vec(0..16usize, 0..8),
    ) {
        let platform = MockPlatform::new();
        let mut integration = initialized(&platform);
        let hits = Arc::new(Mutex::new(vec![0u32; 16]));

        let handles: Vec<CorrelationHandle> = (0..16)
            .map(|index| {
                let hits = Arc::clone(&hits);
                integration
                    .server_started()
                    .on_complete(move |_| hits.lock().unwrap()[index] += 1)
            })
            .collect();

        for &index in order.iter().chain(duplicates.iter()) {
            platform.queue_response(ScriptedResponse::success(handles[index]));
        }
        while integration.dispatch_responses() > 0 {}

        prop_assert_eq!(hits.lock().unwrap().clone(), vec![1u32; 16]);
        prop_assert_eq!(integration.pending_requests(), 0);
        prop_assert_eq!(integration.response_stats().unmatched, duplicates.len() as u64);
        prop_assert_eq!(platform.live_objects(), 0);
    }

    /// Property: no accepted warning burst exceeds one per second or ten per minute
    #[test]
    fn warning_windows_are_never_exceeded(gaps in arb_gaps()) {
        let clock = MockTimeSource::new_at(1_000_000);
        let mut limiter = OperationLimiter::new(clock.clone());
        let mut accepted: Vec<u64> = Vec::new();

        for gap in gaps {
            clock.advance(gap);
            if limiter.admit(OperationClass::WarningMessage, &["careful"]).is_ok() {
                accepted.push(clock.current_time());
            }
        }

        for (i, &at) in accepted.iter().enumerate() {
            let in_second = accepted[..=i].iter().filter(|&&t| t > at.saturating_sub(1_000)).count();
            let in_minute = accepted[..=i].iter().filter(|&&t| t > at.saturating_sub(60_000)).count();
            prop_assert!(in_second <= 1);
            prop_assert!(in_minute <= 10);
        }
    }
}
