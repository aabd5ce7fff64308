use anamnese_organizer::discovery::ClipDiscovery;
use anamnese_organizer::{Clip, DestinationName, SelectionTable, TakeAllocator};
use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

/// A session's worth of stems with a retake every seventh sentence
fn session_clips(count: usize) -> Vec<Clip> {
    let mut clips = Vec::with_capacity(count);
    for i in 0..count {
        let stem = if i % 7 == 6 {
            format!("{:04}b", i - 1)
        } else {
            format!("{:04}", i)
        };
        clips.push(Clip::new(
            "flir",
            format!("/data/flir/{}.mp4", stem),
            Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
        ));
    }
    clips
}

/// Benchmark retake selection over one channel
fn bench_selection(c: &mut Criterion) {
    let clips = session_clips(2000);

    c.bench_function("selection_table_2000", |b| {
        b.iter(|| SelectionTable::resolve(black_box(&clips)))
    });
}

/// Benchmark take allocation in a crowded folder
fn bench_take_allocation(c: &mut Criterion) {
    let folder = Path::new("/out/selected/S7");

    c.bench_function("take_allocation_100", |b| {
        b.iter(|| {
            let mut allocator = TakeAllocator::new();
            for _ in 0..100 {
                let name = DestinationName::new("S7", "p002", "c1", "mp4");
                let _ = allocator.allocate(folder, black_box(name), |_| false);
            }
        })
    });
}

/// Benchmark clip enumeration of a channel directory
fn bench_discovery(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..200 {
        File::create(temp_dir.path().join(format!("{:04}.mp4", i))).unwrap();
    }
    let discovery = ClipDiscovery::default();

    c.bench_function("discover_channel_200", |b| {
        b.iter(|| discovery.discover_channel("flir", black_box(temp_dir.path())))
    });
}

criterion_group!(benches, bench_selection, bench_take_allocation, bench_discovery);
criterion_main!(benches);
