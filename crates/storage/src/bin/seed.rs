use std::fmt;

use chrono::{DateTime, Utc};
use course_core::model::{Course, CourseId, Lesson, LessonId, User, UserId};
use storage::repository::{
    CourseRecord, CourseRepository as _, LessonRecord, NewUserRecord, Storage,
    UserRepository as _,
};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    course_title: String,
    lessons: u32,
    user_id: UserId,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLessons { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLessons { raw } => write!(f, "invalid --lessons value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut course_id = std::env::var("COURSE_ID")
            .map_or_else(|_| CourseId::new("a1-german"), CourseId::new);
        let mut course_title =
            std::env::var("COURSE_TITLE").unwrap_or_else(|_| "German A1".into());
        let mut lessons = std::env::var("COURSE_LESSONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut user_id =
            std::env::var("COURSE_USER_ID").map_or_else(|_| UserId::new("demo-user"), UserId::new);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = CourseId::new(value);
                }
                "--course-title" => {
                    let value = require_value(&mut args, "--course-title")?;
                    course_title = value;
                }
                "--lessons" => {
                    let value = require_value(&mut args, "--lessons")?;
                    lessons = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessons { raw: value.clone() })?;
                }
                "--user-id" => {
                    let value = require_value(&mut args, "--user-id")?;
                    user_id = UserId::new(value);
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?;
                    now = Some(parsed.with_timezone(&Utc));
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            course_title,
            lessons,
            user_id,
            now,
        })
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse()?;
    let now = args.now.unwrap_or_else(Utc::now);

    let storage = Storage::sqlite(&args.db_url).await?;

    let course = Course::new(
        args.course_id.clone(),
        args.course_title.clone(),
        "Seeded demo course",
        "A1",
        "Demo Instructor",
        "https://example.com/cover.png",
        format!("{} lessons", args.lessons),
        now,
    )?;
    storage
        .courses
        .upsert_course(&CourseRecord::from_course(&course))
        .await?;

    for n in 1..=args.lessons {
        let lesson = Lesson::new(
            LessonId::new(format!("{}-lesson-{n}", args.course_id)),
            format!("Lesson {n}"),
            format!("Seeded lesson {n}"),
            format!("Content for lesson {n}."),
            format!("https://example.com/videos/{n}.mp4"),
            "10 min",
            n,
        )?;
        storage
            .courses
            .upsert_lesson(&LessonRecord::from_lesson(&args.course_id, &lesson))
            .await?;
    }

    let user = User::new(args.user_id.clone(), now);
    storage
        .users
        .insert_user(&NewUserRecord::from_user(&user))
        .await?;
    storage
        .users
        .enroll(&args.user_id, &args.course_id, now)
        .await?;

    println!(
        "seeded course '{}' with {} lessons and enrolled user '{}' ({})",
        args.course_id, args.lessons, args.user_id, args.db_url
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
