// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use editbridge::config::EditorConfig;
use editbridge::editor::{Command, EditorSession};
use editbridge::format::parse_document;
use editbridge::model::PageId;

mod fixtures;

use fixtures::Case;

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse::<usize>().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse::<u64>().ok()).unwrap_or(default)
}

fn criterion() -> Criterion {
    let sample_size = env_usize("BENCH_SAMPLE_SIZE", 60).clamp(10, 200);
    let warmup_secs = env_u64("BENCH_WARMUP_SECS", 3).clamp(1, 60);
    let measurement_secs = env_u64("BENCH_MEASUREMENT_SECS", 5).clamp(1, 120);

    Criterion::default()
        .sample_size(sample_size)
        .warm_up_time(Duration::from_secs(warmup_secs))
        .measurement_time(Duration::from_secs(measurement_secs))
}

fn inject(markup: &str) -> EditorSession {
    let doc = parse_document(markup).expect("fixture markup");
    EditorSession::inject(doc, PageId::default_page(), EditorConfig::default(), false)
        .expect("inject")
}

const CASES: [(&str, Case); 3] =
    [("small", Case::Small), ("medium", Case::Medium), ("large", Case::Large)];

// Benchmark identity (keep stable):
// - Group names in this file: `editor.inject`, `editor.snapshot`, `editor.undo_redo`
// - Case IDs (`small`, `medium`, `large`) must stay stable so results remain comparable.
fn benches_editor(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("editor.inject");
        for (case_id, case) in CASES {
            let markup = fixtures::landing_page(case);
            group.throughput(Throughput::Bytes(markup.len() as u64));
            group.bench_function(case_id, move |b| {
                b.iter(|| {
                    let session = inject(black_box(&markup));
                    black_box(session.editable_elements().len())
                })
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("editor.snapshot");
        for (case_id, case) in CASES {
            let session = inject(&fixtures::landing_page(case));
            group.throughput(Throughput::Elements(session.editable_elements().len() as u64));
            group.bench_function(case_id, move |b| {
                b.iter(|| black_box(session.snapshot_markup().len()))
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("editor.undo_redo");
        for (case_id, case) in CASES {
            let mut session = inject(&fixtures::landing_page(case));
            let target = session.editable_elements()[0];
            session.click(target);
            session.execute(Command::Bold);
            session.drain_effects();

            group.bench_function(case_id, move |b| {
                b.iter(|| {
                    session.undo();
                    session.redo();
                    black_box(session.drain_effects().len())
                })
            });
        }
        group.finish();
    }
}

criterion_group! {
    name = benches;
    config = criterion();
    targets = benches_editor
}
criterion_main!(benches);
