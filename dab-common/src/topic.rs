//! DAB topic grammar.
//!
//! Request topics follow `dab/<deviceId>/<operation-suffix>` where the
//! deviceId segment carries no `/`. The cross-device discovery operation
//! uses the bare `dab/discovery` topic.

/// Leading segment of every DAB topic.
pub const DAB_PREFIX: &str = "dab";

/// Cross-device discovery topic (no deviceId segment).
pub const DISCOVERY_TOPIC: &str = "dab/discovery";

/// Build a request topic from a deviceId and an operation suffix. The
/// suffix carries its leading `/`.
///
/// # Example
/// ```
/// use dab_common::topic::operation_topic;
///
/// assert_eq!(
///     operation_topic("tv1", "/applications/launch"),
///     "dab/tv1/applications/launch"
/// );
/// ```
pub fn operation_topic(device_id: &str, suffix: &str) -> String {
    format!("{DAB_PREFIX}/{device_id}{suffix}")
}

/// Publish topic for device-scoped telemetry samples.
///
/// # Example
/// ```
/// use dab_common::topic::device_telemetry_topic;
///
/// assert_eq!(
///     device_telemetry_topic("tv1"),
///     "dab/tv1/device-telemetry/metrics"
/// );
/// ```
pub fn device_telemetry_topic(device_id: &str) -> String {
    format!("{DAB_PREFIX}/{device_id}/device-telemetry/metrics")
}

/// Publish topic for per-application telemetry samples.
///
/// # Example
/// ```
/// use dab_common::topic::app_telemetry_topic;
///
/// assert_eq!(
///     app_telemetry_topic("tv1", "netflix"),
///     "dab/tv1/app-telemetry/metrics/netflix"
/// );
/// ```
pub fn app_telemetry_topic(device_id: &str, app_id: &str) -> String {
    format!("{DAB_PREFIX}/{device_id}/app-telemetry/metrics/{app_id}")
}

/// Components of a `dab/<deviceId>/<suffix>` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic<'a> {
    pub device_id: &'a str,
    pub suffix: &'a str,
}

/// Split a request topic into deviceId and operation suffix. Returns
/// `None` for anything that does not match the grammar, the discovery
/// topic included.
///
/// # Example
/// ```
/// use dab_common::topic::parse_topic;
///
/// let parsed = parse_topic("dab/tv1/applications/launch").unwrap();
/// assert_eq!(parsed.device_id, "tv1");
/// assert_eq!(parsed.suffix, "applications/launch");
/// assert!(parse_topic("dab/discovery").is_none());
/// ```
pub fn parse_topic(topic: &str) -> Option<ParsedTopic<'_>> {
    let rest = topic.strip_prefix("dab/")?;
    let (device_id, suffix) = rest.split_once('/')?;
    if device_id.is_empty() || suffix.is_empty() {
        return None;
    }
    Some(ParsedTopic { device_id, suffix })
}
