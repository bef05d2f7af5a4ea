use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

lazy_static! {
    pub static ref SFU_ACTIVE_SESSIONS: IntGauge =
        register_int_gauge!("sfu_active_sessions", "Number of currently active sessions").unwrap();
    pub static ref SFU_ACTIVE_PEERS: IntGauge = register_int_gauge!(
        "sfu_active_peers",
        "Number of currently active peers (participants)"
    )
    .unwrap();
    pub static ref SFU_PACKETS_FORWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sfu_packets_forwarded_total",
        "Total number of RTP packets forwarded",
        &["media_type"]
    )
    .unwrap();
    pub static ref SFU_PACKETS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sfu_packets_dropped_total",
        "Total number of RTP packets dropped",
        &["reason"]
    )
    .unwrap();
    pub static ref SFU_PLIS_SENT_TOTAL: IntCounter = register_int_counter!(
        "sfu_plis_sent_total",
        "Total number of PLIs (keyframe requests) sent to publishers"
    )
    .unwrap();
    pub static ref SFU_RENEGOTIATIONS_TOTAL: IntCounter = register_int_counter!(
        "sfu_renegotiations_total",
        "Total number of renegotiation offers sent to peers"
    )
    .unwrap();
    pub static ref SFU_WEBRTC_CONNECTION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "sfu_webrtc_connection_failures_total",
        "Total number of WebRTC connection failures"
    )
    .unwrap();
}

pub fn register_metrics() {
    let _ = SFU_ACTIVE_SESSIONS.get();
    let _ = SFU_ACTIVE_PEERS.get();
    let _ = SFU_PACKETS_FORWARDED_TOTAL.with_label_values(&["video"]).get();
    let _ = SFU_PACKETS_DROPPED_TOTAL.with_label_values(&["write_error"]).get();
    let _ = SFU_PLIS_SENT_TOTAL.get();
    let _ = SFU_RENEGOTIATIONS_TOTAL.get();
    let _ = SFU_WEBRTC_CONNECTION_FAILURES_TOTAL.get();
}
