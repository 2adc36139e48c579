// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde::de::DeserializeOwned;
use tradehub_client::{
    balances::BalanceChangedMsg,
    instruments::UnderlyingListMsg,
    portfolio::positions::{PositionMsg, PositionsPage},
    websocket::messages::{WsApiMessage, parse_raw_message},
};

const POSITION_CHANGED: &str = include_str!("../test_data/ws_position_changed.json");
const POSITIONS_PAGE: &str = include_str!("../test_data/ws_positions_page.json");
const BALANCE_CHANGED: &str = include_str!("../test_data/ws_balance_changed.json");
const UNDERLYING_LIST: &str = include_str!("../test_data/ws_underlying_list.json");
const TIME_SYNC: &str = include_str!("../test_data/ws_time_sync.json");

// =============================================================================
// FRAME CLASSIFICATION BENCHMARKS
// =============================================================================

fn bench_frame_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Classification");

    let frames = [
        ("position_changed", POSITION_CHANGED),
        ("positions_page", POSITIONS_PAGE),
        ("balance_changed", BALANCE_CHANGED),
        ("underlying_list", UNDERLYING_LIST),
        ("time_sync", TIME_SYNC),
    ];

    for (name, frame) in &frames {
        group.bench_with_input(BenchmarkId::new("classify", name), frame, |b, frame| {
            b.iter(|| {
                let msg = parse_raw_message(black_box(frame)).unwrap();
                black_box(msg);
            });
        });
    }

    group.finish();
}

// =============================================================================
// PAYLOAD DECODING BENCHMARKS
// =============================================================================

fn payload<T: DeserializeOwned>(frame: &str) -> serde_json::Value {
    match parse_raw_message(frame).unwrap() {
        WsApiMessage::Event { msg, .. }
        | WsApiMessage::Reply { msg, .. }
        | WsApiMessage::Result { msg, .. } => {
            serde_json::from_value::<T>(msg.clone()).unwrap();
            msg
        }
        other => panic!("Unexpected frame {other:?}"),
    }
}

fn bench_payload_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Payload Decoding");

    let position = payload::<PositionMsg>(POSITION_CHANGED);
    group.bench_function("position_changed", |b| {
        b.iter(|| {
            let msg: PositionMsg = serde_json::from_value(black_box(position.clone())).unwrap();
            black_box(msg);
        });
    });

    let page = payload::<PositionsPage>(POSITIONS_PAGE);
    group.bench_function("positions_page", |b| {
        b.iter(|| {
            let msg: PositionsPage = serde_json::from_value(black_box(page.clone())).unwrap();
            black_box(msg);
        });
    });

    let balance = payload::<BalanceChangedMsg>(BALANCE_CHANGED);
    group.bench_function("balance_changed", |b| {
        b.iter(|| {
            let msg: BalanceChangedMsg =
                serde_json::from_value(black_box(balance.clone())).unwrap();
            black_box(msg);
        });
    });

    let underlyings = payload::<UnderlyingListMsg>(UNDERLYING_LIST);
    group.bench_function("underlying_list", |b| {
        b.iter(|| {
            let msg: UnderlyingListMsg =
                serde_json::from_value(black_box(underlyings.clone())).unwrap();
            black_box(msg);
        });
    });

    group.finish();
}

// =============================================================================
// BATCH PROCESSING BENCHMARKS
// =============================================================================

fn bench_batch_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch Processing");

    let frames = [POSITION_CHANGED, POSITION_CHANGED, BALANCE_CHANGED, TIME_SYNC];

    for batch_size in [10_usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));

        group.bench_with_input(
            BenchmarkId::new("mixed_frames", batch_size),
            &batch_size,
            |b, &size| {
                b.iter(|| {
                    for i in 0..size {
                        let msg = parse_raw_message(frames[i % frames.len()]).unwrap();
                        black_box(msg);
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_classification,
    bench_payload_decoding,
    bench_batch_processing
);
criterion_main!(benches);
