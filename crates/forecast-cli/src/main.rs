//! 캔들 예측 파이프라인 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 스키마 생성
//! forecast migrate
//!
//! # 90일 백필 후 학습 + 캐시 재계산
//! forecast backfill --days 90
//! forecast train
//!
//! # 최근 캔들 수집 (futures 갱신 포함)
//! forecast ingest
//!
//! # 캐시된 시리즈 조회
//! forecast series-cached --start 2024-03-01 --end 2024-03-07
//!
//! # 데몬 모드
//! forecast daemon
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use forecast_core::{init_logging, job_span, ForecastConfig, TimeWindow};
use forecast_data::Database;
use forecast_ml::{BackfillParams, JobOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

mod app;

use app::{parse_time, redacted_config, window_from_args, Pipeline};

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Candle forecasting pipeline - 수집, 학습, 예측 시리즈", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (없으면 기본값 + 환경 변수)
    #[arg(long, env = "FORECAST_CONFIG", default_value = "config/forecast.toml")]
    config: PathBuf,

    /// 로그 레벨 오버라이드 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 데이터베이스 마이그레이션 실행
    Migrate,

    /// 적용된 설정 출력 (TOML, 비밀 값 가림)
    Config,

    /// 최근 캔들 수집 및 마지막 마감 캔들의 futures 갱신
    Ingest,

    /// 과거 캔들 백필
    Backfill {
        /// 백필 일수
        #[arg(long)]
        days: Option<u32>,

        /// 심볼 (예: BTCUSDT)
        #[arg(long)]
        symbol: Option<String>,

        /// 캔들 간격 (예: 1h)
        #[arg(long)]
        interval: Option<String>,

        /// 요청 사이 대기 (밀리초)
        #[arg(long)]
        sleep_ms: Option<u64>,

        /// 요청당 캔들 수 (최대 1000)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// 모델 학습 후 캐시 재계산
    Train {
        /// 학습 구간 일수 (기본: training.lookback_days)
        #[arg(long)]
        days: Option<u32>,

        /// 학습 후 캐시 재계산 생략
        #[arg(long, default_value = "false")]
        no_apply: bool,
    },

    /// 캐시(series_cache) 재계산
    Apply {
        /// 재계산 구간 일수 (기본: training.lookback_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// 캔들에서 바로 계산한 시리즈
    Series {
        /// 시작 시각 (RFC 3339 또는 YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// 종료 시각
        #[arg(long)]
        end: Option<String>,
    },

    /// 캐시된 시리즈
    SeriesCached {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },

    /// 타깃 시각의 futures 갱신 (시각 없으면 최신 캔들)
    FuturesUpdate {
        /// 타깃 시각 (여러 번 지정 가능)
        #[arg(long = "time")]
        times: Vec<String>,
    },

    /// futures 시리즈 조회
    Futures {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },

    /// 마지막 성공 학습의 검증 지표
    Metrics,

    /// 데몬 모드: 주기적으로 수집 / 학습 + 캐시 재계산
    Daemon,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 결과를 출력합니다. `error` 상태만 실패로 취급합니다.
fn report<T: Serialize>(outcome: &JobOutcome<T>) -> anyhow::Result<()> {
    print_json(outcome)?;
    match outcome {
        JobOutcome::Error { message } => anyhow::bail!("job failed: {}", message),
        _ => Ok(()),
    }
}

/// 학습 후 캐시를 재계산합니다.
async fn train_and_apply(pipeline: &Pipeline, days: Option<u32>, apply: bool) -> anyhow::Result<()> {
    let trained = pipeline.trainer.train(days).await;
    print_json(&trained)?;

    if apply {
        let days = days.unwrap_or_else(|| pipeline.lookback_days());
        let applied = pipeline.materializer.materialize(days).await;
        report(&applied)?;
    }

    match trained {
        JobOutcome::Error { message } => anyhow::bail!("training failed: {}", message),
        _ => Ok(()),
    }
}

async fn run_daemon(pipeline: &Pipeline) {
    let daemon = &pipeline.config.daemon;
    info!(
        ingest_interval_secs = daemon.ingest_interval_secs,
        train_interval_secs = daemon.train_interval_secs,
        "=== 데몬 모드 시작 ==="
    );

    let mut ingest_tick = tokio::time::interval(Duration::from_secs(daemon.ingest_interval_secs.max(1)));
    ingest_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut train_tick = tokio::time::interval(Duration::from_secs(daemon.train_interval_secs.max(1)));
    train_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("종료 신호 수신, 데몬 종료 중...");
                break;
            }
            _ = ingest_tick.tick() => {
                let outcome = pipeline.ingestor.ingest().instrument(job_span!("ingest")).await;
                if let JobOutcome::Error { message } = outcome {
                    error!("수집 실패: {}", message);
                }
            }
            _ = train_tick.tick() => {
                let days = pipeline.lookback_days();
                let trained = pipeline.trainer.train(None).instrument(job_span!("train", days)).await;
                if !trained.is_ok() {
                    warn!(status = trained.status(), "학습 미완료, 기존 모델로 캐시 재계산");
                }
                let applied = pipeline.materializer.materialize(days).instrument(job_span!("apply", days)).await;
                if let JobOutcome::Error { message } = applied {
                    error!("캐시 재계산 실패: {}", message);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ForecastConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let mut log_config = config.logging.to_log_config();
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    if let Commands::Config = cli.command {
        print!("{}", toml::to_string_pretty(&redacted_config(&config))?);
        return Ok(());
    }

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.health_check().await.context("database health check failed")?;

    if let Commands::Migrate = cli.command {
        db.migrate().await.context("migration failed")?;
        info!("마이그레이션 완료");
        return Ok(());
    }

    let pipeline = Pipeline::postgres(config, &db)?;

    let result = match cli.command {
        Commands::Migrate | Commands::Config => Ok(()),
        Commands::Ingest => report(&pipeline.ingestor.ingest().await),
        Commands::Backfill {
            days,
            symbol,
            interval,
            sleep_ms,
            limit,
        } => {
            let params = BackfillParams {
                days,
                symbol,
                interval,
                sleep_ms,
                limit,
            };
            report(&pipeline.ingestor.backfill(params).await)
        }
        Commands::Train { days, no_apply } => train_and_apply(&pipeline, days, !no_apply).await,
        Commands::Apply { days } => {
            let days = days.unwrap_or_else(|| pipeline.lookback_days());
            report(&pipeline.materializer.materialize(days).await)
        }
        Commands::Series { start, end } => {
            let fallback = TimeWindow::LastDays(pipeline.config.series.fallback_days);
            let window = window_from_args(start.as_deref(), end.as_deref(), fallback)?;
            print_json(&pipeline.materializer.predict_series(window).await?)
        }
        Commands::SeriesCached { start, end } => {
            let fallback = TimeWindow::LastDays(pipeline.config.series.fallback_days);
            let window = window_from_args(start.as_deref(), end.as_deref(), fallback)?;
            print_json(&pipeline.materializer.load_cached(Some(window)).await?)
        }
        Commands::FuturesUpdate { times } => {
            if times.is_empty() {
                report(&pipeline.futures.update_latest().await)
            } else {
                let times = times
                    .iter()
                    .map(|t| parse_time(t))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                report(&pipeline.futures.update_incremental(&times).await)
            }
        }
        Commands::Futures { start, end } => {
            let window = window_from_args(start.as_deref(), end.as_deref(), TimeWindow::All)?;
            print_json(&pipeline.futures.load(window).await?)
        }
        Commands::Metrics => match pipeline.metrics.latest().await? {
            Some(metrics) => print_json(&metrics),
            None => print_json(&serde_json::json!({ "status": "empty" })),
        },
        Commands::Daemon => {
            run_daemon(&pipeline).await;
            Ok(())
        }
    };

    db.close().await;
    result
}
