use criterion::{criterion_group, criterion_main, Criterion, BenchmarkId, Throughput, black_box};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coachrs::database::Database;
use coachrs::engine::CoachEngine;
use coachrs::error::NotifyError;
use coachrs::fatigue::FatigueScorer;
use coachrs::load::{summarize_sessions, LoadAggregator};
use coachrs::models::{Checkin, EligibleUser, Session, SportKind};
use coachrs::notify::Notifier;

/// Performance benchmarks for the coaching engine
///
/// These benchmarks test the core aggregations and a full decision pass
/// with varying dataset sizes to ensure scalability.

fn bench_load_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("Load Summary");

    for &size in &[10, 100, 1000, 5000] {
        let sessions = create_session_dataset(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("summarize_sessions", size),
            &sessions,
            |b, sessions| {
                b.iter(|| {
                    black_box(summarize_sessions(sessions, 7));
                });
            },
        );
    }

    group.finish();
}

fn bench_fatigue_scoring(c: &mut Criterion) {
    let scorer = FatigueScorer::new();
    let mut group = c.benchmark_group("Fatigue Scoring");

    for &size in &[1, 7, 14] {
        let checkins = create_checkin_dataset(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("score_checkins", size),
            &checkins,
            |b, checkins| {
                b.iter(|| {
                    black_box(scorer.score_checkins(checkins));
                });
            },
        );
    }

    group.finish();
}

fn bench_coach_pass(c: &mut Criterion) {
    let engine = CoachEngine::new();
    let notifier = SilentNotifier;
    let as_of = benchmark_instant();
    let mut group = c.benchmark_group("Coach Pass");

    for &num_users in &[1, 10, 50] {
        group.throughput(Throughput::Elements(num_users as u64));
        group.bench_with_input(
            BenchmarkId::new("run_batch", num_users),
            &num_users,
            |b, &num_users| {
                b.iter_batched(
                    || populate_database(num_users),
                    |db| {
                        black_box(engine.run_batch(&db, &notifier, as_of).unwrap());
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_database_operations(c: &mut Criterion) {
    let as_of = benchmark_instant();
    let mut group = c.benchmark_group("Database Operations");

    for &batch_size in &[10, 100, 1000] {
        let sessions = create_session_dataset(batch_size);

        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("upsert_sessions", batch_size),
            &sessions,
            |b, sessions| {
                b.iter_batched(
                    || {
                        let db = Database::open_in_memory().unwrap();
                        db.ensure_user(1).unwrap();
                        db
                    },
                    |db| {
                        for session in sessions {
                            db.upsert_session(session).unwrap();
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    for &count in &[100, 1000] {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(1).unwrap();
        for session in &create_session_dataset(count) {
            db.upsert_session(session).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("window_query", count), &count, |b, _| {
            b.iter(|| {
                black_box(
                    db.sessions_in(1, as_of - Duration::days(7), as_of)
                        .unwrap(),
                );
            });
        });
    }

    group.finish();
}

fn bench_snapshot_job(c: &mut Criterion) {
    let as_of = benchmark_instant();
    let mut group = c.benchmark_group("Snapshot Job");

    for &days in &[7, 14, 30] {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(1).unwrap();
        for session in &create_session_dataset(200) {
            db.upsert_session(session).unwrap();
        }

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", days), &days, |b, &days| {
            b.iter(|| {
                black_box(LoadAggregator::snapshot(&db, 1, days, as_of).unwrap());
            });
        });
    }

    group.finish();
}

// Helper functions for benchmarks

/// Notifier that accepts every message without output.
struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _user: &EligibleUser, _text: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn channel_name(&self) -> &'static str {
        "silent"
    }
}

fn benchmark_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
}

fn create_session(user_id: i64, external_id: i64, start: DateTime<Utc>, time_s: u32) -> Session {
    Session {
        user_id,
        external_id,
        sport_type: "Run".to_string(),
        kind: SportKind::Run,
        start_time: start,
        distance_m: Some(Decimal::from(8000)),
        moving_time_s: Some(time_s),
        elevation_m: Some(Decimal::from(60)),
        avg_heart_rate: Some(150),
        name: None,
    }
}

fn create_session_dataset(size: usize) -> Vec<Session> {
    let as_of = benchmark_instant();

    (0..size)
        .map(|i| {
            let sport = match i % 3 {
                0 => "Run",
                1 => "Ride",
                _ => "Swim",
            };

            let mut session = create_session(
                1,
                i as i64,
                as_of - Duration::minutes((i as i64 * 13) % (7 * 24 * 60)),
                1800 + (i as u32 % 3600),
            );
            session.sport_type = sport.to_string();
            session.kind = SportKind::classify(sport);
            session
        })
        .collect()
}

fn create_checkin_dataset(size: usize) -> Vec<Checkin> {
    let today = benchmark_instant().date_naive();

    (0..size)
        .map(|i| Checkin {
            user_id: 1,
            day: today - Duration::days(i as i64),
            sleep_hours: Some(dec!(6.5) + Decimal::from(i % 3)),
            soreness: Some((i % 5 + 1) as u8),
            mood: Some((i % 5 + 1) as u8),
            note: None,
        })
        .collect()
}

/// A store with `num_users` users, each carrying a spiking week of sessions
/// and a few check-ins, so the pass does representative work.
fn populate_database(num_users: usize) -> Database {
    let db = Database::open_in_memory().unwrap();
    let as_of = benchmark_instant();

    for user in 1..=num_users as i64 {
        db.upsert_user(user, Some(user + 9000), true).unwrap();

        for i in 0..6i64 {
            db.upsert_session(&create_session(
                user,
                user * 1000 + i,
                as_of - Duration::hours(i * 20 + 5),
                3600,
            ))
            .unwrap();
        }
        for i in 0..2i64 {
            db.upsert_session(&create_session(
                user,
                user * 1000 + 100 + i,
                as_of - Duration::days(8 + i),
                1800,
            ))
            .unwrap();
        }
        for day in 0..3i64 {
            db.upsert_checkin(&Checkin {
                user_id: user,
                day: as_of.date_naive() - Duration::days(day),
                sleep_hours: Some(dec!(6.5)),
                soreness: Some(3),
                mood: Some(3),
                note: None,
            })
            .unwrap();
        }
    }

    db
}

// Define benchmark groups
criterion_group!(
    benches,
    bench_load_summary,
    bench_fatigue_scoring,
    bench_coach_pass,
    bench_database_operations,
    bench_snapshot_job
);

criterion_main!(benches);
