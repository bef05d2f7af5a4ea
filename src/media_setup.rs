use std::env;
use tracing::error;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpHeaderExtensionCapability, RTPCodecType,
};

pub struct MediaSetup;

impl MediaSetup {
    pub fn create_webrtc_api() -> webrtc::api::API {
        let mut media_engine = MediaEngine::default();

        // Register Opus with FEC and low latency settings
        use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecParameters;
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: "audio/opus".to_owned(),
                        clock_rate: 48000,
                        channels: 2,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                        ..Default::default()
                    },
                    payload_type: 111,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .unwrap_or_else(|e| {
                panic!("Failed to register Opus codec: {}", e);
            });

        // Register Video Codecs (VP8, H264)
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: "video/VP8".to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: "".to_owned(),
                        ..Default::default()
                    },
                    payload_type: 96,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .unwrap_or_else(|e| {
                panic!("Failed to register VP8 codec: {}", e);
            });

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: "video/H264".to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line:
                            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                                .to_owned(),
                        ..Default::default()
                    },
                    payload_type: 102,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .unwrap_or_else(|e| {
                error!("Failed to register H264 codec: {}", e);
            });

        let extensions = vec![
            "urn:ietf:params:rtp-hdrext:sdes:mid",
            "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id",
            "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id",
            "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time",
            "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
            "urn:ietf:params:rtp-hdrext:ssrc-audio-level",
            "urn:ietf:params:rtp-hdrext:toffset",
            "urn:3gpp:video-orientation",
            "http://www.webrtc.org/experiments/rtp-hdrext/video-content-type",
        ];

        for extension in extensions {
            let _ = media_engine.register_header_extension(
                RTCRtpHeaderExtensionCapability {
                    uri: extension.to_string(),
                },
                RTPCodecType::Video,
                None,
            );
            let _ = media_engine.register_header_extension(
                RTCRtpHeaderExtensionCapability {
                    uri: extension.to_string(),
                },
                RTPCodecType::Audio,
                None,
            );
        }

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).unwrap();

        APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build()
    }

    pub fn get_rtc_config() -> RTCConfiguration {
        let stun_url =
            env::var("STUN_URL").unwrap_or_else(|_| "stun:stun.l.google.com:19302".to_string());

        RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: vec![stun_url],
                ..Default::default()
            }],
            bundle_policy: RTCBundlePolicy::MaxBundle,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_rtc_config_defaults_to_google_stun() {
        env::remove_var("STUN_URL");
        let config = MediaSetup::get_rtc_config();
        assert_eq!(config.ice_servers[0].urls, vec!["stun:stun.l.google.com:19302"]);
    }

    #[test]
    fn test_create_webrtc_api_does_not_panic() {
        let _api = MediaSetup::create_webrtc_api();
    }
}
