use chrono::Local;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tasktracker::error::TrackerError;
use tasktracker::prelude::*;
use tasktracker::tasks::Timestamp;
use tasktracker::tasks::time::format_time;
use tracing_subscriber::EnvFilter;

/// 每日任务日程命令行客户端
#[derive(Parser)]
#[command(name = "tasktracker", version, about = "Daily schedule client for the task tracker backend")]
struct Cli {
    /// 后端根地址，优先于配置文件与环境变量
    #[arg(long, global = true, env = "TASKTRACKER_BASE_URL")]
    base_url: Option<String>,

    /// YAML 配置文件；不指定时从环境变量读取
    #[arg(long, global = true, env = "TASKTRACKER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 查看当前会话
    Auth,
    /// 今日 24 小时日程
    Today,
    /// 全部任务
    List,
    /// 新建任务
    Add {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// 开始时间 HH:MM
        #[arg(long, default_value = "")]
        start: String,
        /// 结束时间 HH:MM
        #[arg(long, default_value = "")]
        end: String,
        /// 1 (最紧急) 到 5
        #[arg(long, default_value_t = 3)]
        priority: i64,
        #[arg(long)]
        required: bool,
        /// daily | weekly | biweekly | monthly | bimonthly | yearly
        #[arg(long)]
        repeat: Option<String>,
        /// 重复的星期，0 = 周日，可重复指定
        #[arg(long = "weekday")]
        weekdays: Vec<u8>,
        #[arg(long)]
        interval: Option<u32>,
    },
    /// 将任务标记为完成
    Complete { id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasktracker=info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("❌ {}", describe(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(url) = cli.base_url {
        config = config.with_base_url(url)?;
    }

    let api = Arc::new(HttpTaskApi::new(config)?);
    let service = TaskService::new(api, QueryCache::new());

    match cli.command {
        Command::Auth => match service.check_auth().await {
            AuthState::Authenticated(user) => {
                println!("✅ {} ({}) · {}", user.fullname, user.username, user.role)
            }
            AuthState::Unauthenticated(reason) => println!("🔒 未登录: {}", reason),
        },
        Command::Today => {
            let now = Local::now();
            let schedule = service.today_schedule(&now).await?;
            print_schedule(&schedule);
        }
        Command::List => {
            let tasks = service.all_tasks().await?;
            if tasks.is_empty() {
                println!("暂无任务");
            }
            for task in tasks.iter() {
                print_task_line(task);
            }
        }
        Command::Add {
            title,
            description,
            start,
            end,
            priority,
            required,
            repeat,
            weekdays,
            interval,
        } => {
            let mut form = TaskForm::new(title).with_times(&start, &end);
            form.description = description;
            form.priority = priority;
            form.required = required;
            if let Some(frequency) = repeat {
                form = form.with_repeat(&frequency, weekdays);
                form.repeat_interval = interval;
            }
            if let Some(minutes) = form.duration() {
                println!("⏱  时长: {} 分钟", minutes);
            }

            match service.create_task(&mut form, &Local::now()).await? {
                Some(task) => println!("✅ 已创建: {} ({})", task.title, task.id),
                None => println!("✅ 已创建"),
            }
        }
        Command::Complete { id } => match service.complete_task_by_id(&id).await? {
            Completion::Applied => println!("✅ 任务 {} 已完成", id),
            Completion::AlreadyCompleted => println!("ℹ️  任务 {} 早已完成", id),
        },
    }
    Ok(())
}

fn print_schedule(schedule: &DailySchedule) {
    for slot in schedule.slots() {
        let marker = if slot.is_current { "▶" } else { " " };
        match slot.first() {
            None => println!("{} {:>8} │ 空闲", marker, slot.label()),
            Some(task) => {
                println!("{} {:>8} │ {}", marker, slot.label(), summarize(task));
                for extra in slot.overflow() {
                    println!("  {:>8} │ {}", "", summarize(extra));
                }
            }
        }
    }
    if schedule.unscheduled_count() > 0 {
        println!("另有 {} 个任务未设定开始时间", schedule.unscheduled_count());
    }
}

fn summarize(task: &Task) -> String {
    let check = if task.status.is_completed() { "✔" } else { "·" };
    let local = |t: &Timestamp| format_time(&t.with_timezone(&Local));
    let window = match (&task.start_time, &task.end_time) {
        (Some(start), Some(end)) => format!("{}-{}", local(start), local(end)),
        (Some(start), None) => local(start),
        _ => String::new(),
    };
    match task.duration {
        Some(minutes) => format!("{} {} {} ({} 分钟)", check, window, task.title, minutes),
        None => format!("{} {} {}", check, window, task.title),
    }
}

fn print_task_line(task: &Task) {
    println!(
        "{:<24} {:<10} P{} {} {}",
        task.id,
        task.status.as_str(),
        task.priority.value(),
        task.date.format("%Y-%m-%d"),
        task.title
    );
}

fn describe(err: &TrackerError) -> String {
    match err {
        TrackerError::Api(api) => api.user_message().to_string(),
        TrackerError::Validation(errors) => errors
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("\n   "),
        other => other.to_string(),
    }
}
