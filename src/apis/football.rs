use crate::app::ports::{HttpClientPort, RequestOptions};
use crate::common::coerce::parse_day_month_year;
use crate::common::config::Config;
use crate::common::constants::{FOOTBALL_OUTPUT_FILE, FOOTBALL_SOURCE};
use crate::common::error::Result;
use crate::common::types::{scrape_timestamp, DataSource, TabularOutput};
use crate::observability::{metrics, Reporter};
use crate::storage::{write_csv, Encoding};
use chrono::NaiveDate;
use scraper::Html;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    Played,
    Upcoming,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Played => write!(f, "played"),
            MatchStatus::Upcoming => write!(f, "upcoming"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRecord {
    pub match_date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub status: MatchStatus,
    pub source_url: String,
    pub scraped_at: String,
}

/// A match line as read from the page, before date and provenance stamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub home_team: String,
    pub away_team: String,
    /// `(home, away)`, present only for played matches
    pub score: Option<(u32, u32)>,
}

impl ClassifiedLine {
    pub fn status(&self) -> MatchStatus {
        if self.score.is_some() {
            MatchStatus::Played
        } else {
            MatchStatus::Upcoming
        }
    }
}

/// Decides whether a text line opens a block of matches.
pub trait DateHeaderDetector: Send + Sync {
    /// The raw date text of a header line, or `None` for any other line
    fn detect<'a>(&self, line: &'a str) -> Option<&'a str>;
}

/// Turns one line of a match block into teams and an optional score.
pub trait MatchLineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> Option<ClassifiedLine>;
}

/// Header lines look like `10/01/2026`: exactly two slashes and a valid
/// day/month/year.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlashDateDetector;

impl DateHeaderDetector for SlashDateDetector {
    fn detect<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();
        if line.matches('/').count() != 2 {
            return None;
        }
        parse_day_month_year(line).map(|_| line)
    }
}

/// Layout of the results page: `Home 1 0 Away Team` for played matches,
/// `Home Away Team` for upcoming ones.
///
/// Only the first whitespace token is taken as the home team, and a played
/// match is recognised purely by tokens 2 and 3 being unsigned integers.
/// Multi-word home teams or a home team named by a number are misread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreTokenClassifier;

impl MatchLineClassifier for ScoreTokenClassifier {
    fn classify(&self, line: &str) -> Option<ClassifiedLine> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            return None;
        }

        let home_team = parts[0].to_string();
        if parts.len() >= 4 {
            if let (Some(home), Some(away)) = (parse_score(parts[1]), parse_score(parts[2])) {
                return Some(ClassifiedLine {
                    home_team,
                    away_team: parts[3..].join(" "),
                    score: Some((home, away)),
                });
            }
        }

        Some(ClassifiedLine {
            home_team,
            away_team: parts[1..].join(" "),
            score: None,
        })
    }
}

fn parse_score(token: &str) -> Option<u32> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Flatten an HTML document into one line per text node segment.
pub fn flatten_html(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join("\n");
    text.split('\n').map(|l| l.to_string()).collect()
}

/// Page segmentation, independent of where the lines came from.
pub struct MatchParser {
    detector: Box<dyn DateHeaderDetector>,
    classifier: Box<dyn MatchLineClassifier>,
}

impl Default for MatchParser {
    fn default() -> Self {
        Self::new(Box::new(SlashDateDetector), Box::new(ScoreTokenClassifier))
    }
}

impl MatchParser {
    pub fn new(
        detector: Box<dyn DateHeaderDetector>,
        classifier: Box<dyn MatchLineClassifier>,
    ) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    /// Scan the lines for date headers, each followed by a block of match
    /// lines that ends at the first blank line or the next date header.
    /// Exact duplicates are dropped, keeping the first occurrence.
    pub fn parse_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        source_url: &str,
        scraped_at: &str,
    ) -> Vec<MatchRecord> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let Some(date_text) = self.detector.detect(lines[i].as_ref()) else {
                i += 1;
                continue;
            };
            let match_date = parse_day_month_year(date_text);

            let mut j = i + 1;
            while j < lines.len() {
                let line = lines[j].as_ref().trim();
                if line.is_empty() || self.detector.detect(line).is_some() {
                    break;
                }
                if let Some(classified) = self.classifier.classify(line) {
                    let record = MatchRecord {
                        match_date,
                        status: classified.status(),
                        home_score: classified.score.map(|(h, _)| h),
                        away_score: classified.score.map(|(_, a)| a),
                        home_team: classified.home_team,
                        away_team: classified.away_team,
                        source_url: source_url.to_string(),
                        scraped_at: scraped_at.to_string(),
                    };
                    if seen.insert(record.clone()) {
                        matches.push(record);
                    }
                }
                j += 1;
            }
            // resume on the line that ended the block; it may be the next header
            i = j;
        }

        matches
    }

    pub fn parse_html(&self, html: &str, source_url: &str, scraped_at: &str) -> Vec<MatchRecord> {
        self.parse_lines(&flatten_html(html), source_url, scraped_at)
    }
}

impl TabularOutput for [MatchRecord] {
    fn header(&self) -> Vec<String> {
        [
            "match_date",
            "home_team",
            "away_team",
            "home_score",
            "away_score",
            "status",
            "source_url",
            "scraped_at",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|m| {
                vec![
                    m.match_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    m.home_team.clone(),
                    m.away_team.clone(),
                    m.home_score.map(|s| s.to_string()).unwrap_or_default(),
                    m.away_score.map(|s| s.to_string()).unwrap_or_default(),
                    m.status.to_string(),
                    m.source_url.clone(),
                    m.scraped_at.clone(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FootballSettings {
    pub url: String,
    pub request: RequestOptions,
}

impl FootballSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.football.url.clone(),
            request: RequestOptions {
                timeout: config.football_timeout(),
                user_agent: config.user_agent.clone(),
                accept: None,
            },
        }
    }
}

/// League calendar and results from a public HTML page.
pub struct FootballExtractor {
    http: Arc<dyn HttpClientPort>,
    reporter: Arc<dyn Reporter>,
    settings: FootballSettings,
    parser: MatchParser,
}

impl FootballExtractor {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
        settings: FootballSettings,
    ) -> Self {
        Self::with_parser(http, reporter, settings, MatchParser::default())
    }

    pub fn with_parser(
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
        settings: FootballSettings,
        parser: MatchParser,
    ) -> Self {
        Self {
            http,
            reporter,
            settings,
            parser,
        }
    }

    /// Single attempt; any failure is logged and yields `None`.
    pub async fn fetch(&self) -> Option<String> {
        self.reporter
            .info(FOOTBALL_SOURCE, &format!("Fetching {}", self.settings.url));
        metrics::sources::request_attempt(FOOTBALL_SOURCE);
        match self.http.get(&self.settings.url, &self.settings.request).await {
            Ok(resp) if resp.is_success() => {
                metrics::sources::payload_bytes(FOOTBALL_SOURCE, resp.bytes.len());
                Some(resp.text())
            }
            Ok(resp) => {
                metrics::sources::request_error(FOOTBALL_SOURCE);
                self.reporter.error(
                    FOOTBALL_SOURCE,
                    &format!("HTTP error while fetching page: status {}", resp.status),
                );
                None
            }
            Err(e) => {
                metrics::sources::request_error(FOOTBALL_SOURCE);
                self.reporter
                    .error(FOOTBALL_SOURCE, &format!("HTTP error while fetching page: {}", e));
                None
            }
        }
    }

    pub fn parse(&self, html: &str, scraped_at: &str) -> Vec<MatchRecord> {
        self.parser.parse_html(html, &self.settings.url, scraped_at)
    }

    pub fn persist(&self, matches: &[MatchRecord], output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(FOOTBALL_OUTPUT_FILE);
        write_csv(&path, matches, Encoding::Utf8Bom)?;
        Ok(path)
    }
}

#[async_trait::async_trait]
impl DataSource for FootballExtractor {
    fn source_name(&self) -> &'static str {
        FOOTBALL_SOURCE
    }

    fn output_file(&self) -> &'static str {
        FOOTBALL_OUTPUT_FILE
    }

    async fn run(&self, output_dir: &Path) -> Result<()> {
        let Some(html) = self.fetch().await else {
            return Ok(());
        };

        let matches = self.parse(&html, &scrape_timestamp());
        if matches.is_empty() {
            self.reporter
                .error(FOOTBALL_SOURCE, "No matches found after parsing the page");
            return Ok(());
        }

        match self.persist(&matches, output_dir) {
            Ok(path) => self.reporter.info(
                FOOTBALL_SOURCE,
                &format!("Saved {} ({} rows)", path.display(), matches.len()),
            ),
            Err(e) => self
                .reporter
                .error(FOOTBALL_SOURCE, &format!("Failed to write football CSV: {}", e)),
        }
        Ok(())
    }
}
