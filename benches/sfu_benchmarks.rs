use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use sfu::id::ParticipantId;
use sfu::media_setup::MediaSetup;
use sfu::session_table::{Session, SessionTable};
use sfu::track_registry::TrackRegistry;

// 1. Benchmark Packet Cloning (Hot Path Simulation)
// Simulates the cost of cloning a packet once per subscriber on the relay path.
fn bench_packet_cloning(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_operations");

    let payload = vec![0u8; 1200];
    let packet = Packet {
        header: Header {
            version: 2,
            padding: false,
            extension: false,
            marker: false,
            payload_type: 96,
            sequence_number: 1234,
            timestamp: 987654321,
            ssrc: 11223344,
            ..Default::default()
        },
        payload: Bytes::from(payload),
    };

    group.bench_function("clone_packet", |b| {
        b.iter(|| {
            let _ = packet.clone();
        })
    });

    group.finish();
}

// 2. Benchmark Arc vs String Cloning (Optimization Candidate)
fn bench_string_cloning(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_vs_arc");
    let participant_id = "participant_123456789_abcdef_long_string";

    group.bench_function("clone_string", |b| {
        let s = participant_id.to_string();
        b.iter(|| {
            let _ = s.clone();
        })
    });

    group.bench_function("clone_arc_str", |b| {
        let s: Arc<str> = Arc::from(participant_id);
        b.iter(|| {
            let _ = s.clone();
        })
    });

    group.finish();
}

fn dummy_track(id: &str) -> Arc<TrackLocalStaticRTP> {
    Arc::new(TrackLocalStaticRTP::new(
        RTCRtpCodecCapability {
            mime_type: "video/VP8".to_owned(),
            ..Default::default()
        },
        id.to_owned(),
        "stream".to_owned(),
    ))
}

// 3. Benchmark TrackRegistry operations (append/snapshot/remove) at a size
// representative of a large session, to check the vector scan in
// remove_by_owner/snapshot_excluding stays cheap relative to the network I/O
// it gates.
fn bench_track_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("track_registry");

    group.bench_function("append_1000", |b| {
        b.iter(|| {
            let mut registry = TrackRegistry::new();
            for i in 0..1000 {
                registry.append(dummy_track(&format!("t{i}")), ParticipantId::from(format!("u{i}")));
            }
        })
    });

    group.bench_function("snapshot_excluding_1000", |b| {
        let mut registry = TrackRegistry::new();
        for i in 0..1000 {
            registry.append(dummy_track(&format!("t{i}")), ParticipantId::from(format!("u{i}")));
        }
        b.iter(|| {
            let _ = registry.snapshot_excluding(&ParticipantId::from("u0"));
        })
    });

    group.bench_function("remove_by_owner_from_1000", |b| {
        b.iter_batched(
            || {
                let mut registry = TrackRegistry::new();
                for i in 0..1000 {
                    registry.append(dummy_track(&format!("t{i}")), ParticipantId::from(format!("u{}", i % 100)));
                }
                registry
            },
            |mut registry| {
                let _ = registry.remove_by_owner(&ParticipantId::from("u0"));
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

// 4. Benchmark SessionTable contention (read-heavy vs write-heavy access),
// the global lock every signaling and track-arrival path goes through.
fn bench_session_table(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("session_table");

    group.bench_function("write_insert_session", |b| {
        let table = SessionTable::new();
        let mut i = 0;
        b.to_async(&rt).iter(|| {
            i += 1;
            let table = &table;
            async move {
                let mut sessions = table.write().await;
                sessions.insert(format!("room_{i}").into(), Session::default());
            }
        })
    });

    group.bench_function("read_existing_session", |b| {
        let table = SessionTable::new();
        rt.block_on(async {
            table.write().await.insert("room_read".into(), Session::default());
        });
        b.to_async(&rt).iter(|| {
            let table = &table;
            async move {
                let sessions = table.read().await;
                let _ = sessions.get(&"room_read".into());
            }
        })
    });

    group.finish();
}

// 5. Benchmark native TrackLocalStaticRTP fanout: writing one packet to a
// track bound to N peer connections, the replacement for the broadcaster's
// writer-channel fanout loop.
fn bench_track_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let api = MediaSetup::create_webrtc_api();
    let config = MediaSetup::get_rtc_config();

    let mut group = c.benchmark_group("track_fanout");
    group.sample_size(10);

    for subscriber_count in [1, 10, 50].iter() {
        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, &count| {
                let track = dummy_track("fanout");
                let pcs: Vec<_> = (0..count)
                    .map(|_| {
                        let pc = rt.block_on(api.new_peer_connection(config.clone())).unwrap();
                        Arc::new(pc)
                    })
                    .collect();

                for pc in &pcs {
                    rt.block_on(pc.add_track(
                        Arc::clone(&track) as Arc<dyn webrtc::track::track_local::TrackLocal + Send + Sync>,
                    ))
                    .unwrap();
                }

                let packet = Packet {
                    header: Header {
                        ssrc: 12345,
                        ..Default::default()
                    },
                    payload: Bytes::from(vec![0u8; 1200]),
                };

                b.to_async(&rt).iter(|| {
                    let track = track.clone();
                    let packet = packet.clone();
                    async move {
                        let _ = track.write_rtp(&packet).await;
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_packet_cloning,
    bench_string_cloning,
    bench_track_registry,
    bench_session_table,
    bench_track_fanout
);
criterion_main!(benches);
