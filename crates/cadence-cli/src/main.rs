use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Weekday};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cadence_core::domain::{
    DomainEvent, IntervalUnit, OverdueBehavior, RecurrenceRule, RelationRequest,
};
use cadence_core::engine::SaveRequest;
use cadence_core::impls::InMemoryTaskStore;
use cadence_core::ports::{EventSink, FixedClock};
use cadence_core::{SchedulerConfig, Task, TaskDraft, TaskId, Tracker, TrackerBuilder};

/// 受け取ったイベントを 1 行 JSON で表示する
struct PrintingSink;

#[async_trait]
impl EventSink for PrintingSink {
    async fn emit(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("  event: {line}"),
            Err(e) => warn!(error = %e, "event could not be serialized"),
        }
    }
}

/// 一覧表示用の 1 行
#[derive(Serialize)]
struct Row<'a> {
    name: &'a str,
    next_due: Option<NaiveDate>,
    done_today: bool,
    streak: u32,
}

async fn print_day(tracker: &Tracker, date: NaiveDate) -> anyhow::Result<()> {
    println!("-- {date} ({}) --", date.format("%a"));
    for task in tracker.due_tasks(date).await? {
        let row = Row {
            name: &task.name,
            next_due: task.next_due,
            done_today: task.is_completed_on(date),
            streak: task.completion_streak,
        };
        println!("  {}", serde_json::to_string(&row)?);
    }
    Ok(())
}

async fn create(
    tracker: &Tracker,
    draft: TaskDraft,
    relations: RelationRequest,
) -> anyhow::Result<Task> {
    let outcome = tracker
        .save(SaveRequest::create(draft).with_relations(relations))
        .await?;
    Ok(outcome.task)
}

fn load_config() -> anyhow::Result<SchedulerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            SchedulerConfig::from_json_str(&raw).with_context(|| format!("parsing {path}"))
        }
        None => Ok(SchedulerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadence_core=info")),
        )
        .init();

    // (A) 設定と Tracker を用意（時計は 2025-11-03 月曜に固定）
    let config = load_config()?;
    let monday = NaiveDate::from_ymd_opt(2025, 11, 3).context("demo date")?;
    let clock = Arc::new(FixedClock::on(monday));
    let tracker = Arc::new(
        TrackerBuilder::new()
            .store(InMemoryTaskStore::new())
            .clock(Arc::clone(&clock))
            .event_sink(Arc::new(PrintingSink))
            .config(config)
            .build()?,
    );

    // (B) タスク登録
    println!("== saving tasks");
    let kitchen = create(
        &tracker,
        TaskDraft::new(
            "Clean Kitchen",
            RecurrenceRule::weekly().on_days([Weekday::Mon, Weekday::Wed, Weekday::Fri]),
        ),
        RelationRequest::default(),
    )
    .await?;
    let evening = create(
        &tracker,
        TaskDraft::new("Evening routine", RecurrenceRule::daily()),
        RelationRequest::default(),
    )
    .await?;
    let dishwasher = create(
        &tracker,
        TaskDraft::new("Empty dishwasher", RecurrenceRule::adhoc()),
        RelationRequest::default(),
    )
    .await?;
    let dishes = create(
        &tracker,
        TaskDraft::new("Dishes", RecurrenceRule::daily()),
        RelationRequest::default()
            .with_parents([evening.id])
            .with_triggers([dishwasher.id]),
    )
    .await?;
    let counters = create(
        &tracker,
        TaskDraft::new("Wipe counters", RecurrenceRule::daily()),
        RelationRequest::default().with_parents([evening.id]),
    )
    .await?;
    let plants = create(
        &tracker,
        TaskDraft::new("Water plants", RecurrenceRule::new(IntervalUnit::Day, 2))
            .overdue(OverdueBehavior::SkipToNext),
        RelationRequest::default(),
    )
    .await?;
    print_day(&tracker, monday).await?;

    // (C) 月曜の完了。子が全部終わると親も完了、Dishes は食洗機タスクを起こす
    println!("== completing on {monday}");
    let done: [TaskId; 3] = [kitchen.id, dishes.id, counters.id];
    for id in done {
        let report = tracker.toggle_today(id).await?;
        println!(
            "  toggled {id}: {:?} auto_completed={:?} activated={:?}",
            report.transition, report.auto_completed, report.activated
        );
    }
    print_day(&tracker, monday).await?;

    // (D) 取り消し。親も一緒に戻る
    println!("== undoing Wipe counters");
    let report = tracker.toggle_today(counters.id).await?;
    println!("  auto_uncompleted={:?}", report.auto_uncompleted);
    tracker.toggle_today(counters.id).await?;

    // (E) 2 日進めて繰り越し
    clock.advance(TimeDelta::days(2));
    let wednesday = tracker.today();
    println!("== rolling over to {wednesday}");
    let report = tracker.roll_over(wednesday).await?;
    println!(
        "  streak_resets={} rescheduled={:?} purged={}",
        report.streak_resets.len(),
        report.rescheduled,
        report.purged.len()
    );

    let plants = tracker.get(plants.id).await?;
    println!("  {} next due {:?}", plants.name, plants.next_due);
    print_day(&tracker, wednesday).await?;

    Ok(())
}
