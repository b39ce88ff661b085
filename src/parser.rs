//! Narrow extractors for the portal's markup. Every assumption about the
//! vendor's HTML lives here, so markup drift stays a local fix.

use crate::error::{PortalError, Result};
use crate::models::{LogEntry, User};
use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub const LOG_DATE_FORMAT: &str = "%Y.%m.%d %H:%M:%S";
const LOG_DATE_LEN: usize = 19;

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static PAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d+)\.html$").unwrap());
static WHO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"user:(.*?)\(callR").unwrap());
static APT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(callR:1\):(\d+)").unwrap());

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.items tbody tr").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.items").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static EMPTY_CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td.empty").unwrap());
static PAGER_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href*='_page/']").unwrap());
static OUTPUT_OPTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#GatesconfigDeviceUsersdatabase_output option").unwrap());

const FORM_SELECTORS: &[&str] = &["body > form[action]", "form[action]"];
const DOWNLOAD_SELECTORS: &[&str] = &[
    "body > div > div > a:nth-of-type(2)",
    "a[href$='.txt']",
    "a[href$='.log']",
];

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_attr(document: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|selector_str| {
        let selector = Selector::parse(selector_str).ok()?;
        document
            .select(&selector)
            .find_map(|el| el.value().attr(attr))
            .map(str::to_string)
    })
}

/// The CSRF cookie holds a percent-encoded serialized value; the token is
/// its first double-quoted string.
pub fn csrf_token_from_cookie(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    QUOTED_RE
        .captures(&decoded)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Highest page number linked from the users grid pager. A grid without a
/// pager has a single page.
pub fn last_page(html: &str) -> usize {
    let document = Html::parse_document(html);
    document
        .select(&PAGER_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| PAGE_RE.captures(href))
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .max()
        .unwrap_or(1)
}

/// Rows of the users grid. Columns are name, phone and output label; being
/// listed implies app access.
pub fn user_rows(html: &str) -> Result<Vec<User>> {
    let document = Html::parse_document(html);
    if document.select(&TABLE_SEL).next().is_none() {
        return Err(PortalError::Scrape("users table not found".to_string()));
    }

    let mut users = Vec::new();
    for row in document.select(&ROW_SEL) {
        if row.select(&EMPTY_CELL_SEL).next().is_some() {
            continue;
        }
        let cells: Vec<String> = row.select(&CELL_SEL).map(text_of).collect();
        if cells.len() < 3 {
            return Err(PortalError::Scrape(format!(
                "users row has {} cells, expected at least 3",
                cells.len()
            )));
        }
        users.push(User {
            name: cells[0].clone(),
            phone: cells[1].clone(),
            output: cells[2].clone(),
            app_access: true,
        });
    }
    Ok(users)
}

pub fn form_action(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    first_attr(&document, FORM_SELECTORS, "action")
        .ok_or_else(|| PortalError::Scrape("add-user form action not found".to_string()))
}

/// `(label, value)` pairs of the output channel dropdown, in page order.
pub fn output_options(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    document
        .select(&OUTPUT_OPTION_SEL)
        .filter_map(|option| {
            let label = text_of(option);
            if label.is_empty() {
                return None;
            }
            let value = option.value().attr("value").unwrap_or_default().to_string();
            Some((label, value))
        })
        .collect()
}

pub fn download_link(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    first_attr(&document, DOWNLOAD_SELECTORS, "href")
        .ok_or_else(|| PortalError::Scrape("log file download link not found".to_string()))
}

/// Parse one logical record, e.g.
/// `2023.09.23 20:08:56 Opened by user:18TVName(callR:1):0871234567`.
pub fn parse_log_line(line: &str) -> Result<LogEntry> {
    let fail = |reason: String| PortalError::LogParse {
        line: line.to_string(),
        reason,
    };

    let date_str = line
        .get(..LOG_DATE_LEN)
        .ok_or_else(|| fail("line is shorter than its timestamp".to_string()))?;
    let when = NaiveDateTime::parse_from_str(date_str, LOG_DATE_FORMAT)
        .map_err(|e| fail(format!("bad timestamp '{}': {}", date_str, e)))?;

    let who = WHO_RE.captures(line).map(|caps| caps[1].to_string());
    let apt_no = who
        .as_deref()
        .and_then(|who| APT_RE.captures(who))
        .and_then(|caps| caps[1].parse::<u32>().ok());
    let phone = PHONE_RE.captures(line).map(|caps| caps[1].to_string());

    Ok(LogEntry { when, who, phone, apt_no })
}

/// The log file wraps every record over two physical lines; glue them back.
/// Blank lines are not part of any record and are skipped. A record left
/// without its second half is a parse error.
pub fn join_wrapped_lines(text: &str) -> Result<Vec<String>> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    lines
        .chunks(2)
        .map(|pair| match pair {
            [first, second] => Ok(format!("{}{}", first, second)),
            _ => Err(PortalError::LogParse {
                line: pair.concat(),
                reason: "record is missing its second line".to_string(),
            }),
        })
        .collect()
}
