use std::fmt;

/// Length of one FITS header record.
pub const RECORD_LEN: usize = 80;

/// Longest string value that fits on one record between the quotes.
const MAX_TEXT_LEN: usize = 68;

/// Keywords describing the data array. They are rewritten by the FITS
/// library for every saved image and never carried between frames.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BZERO", "BSCALE",
    "BLANK", "CHECKSUM", "DATASUM", "END",
];

/// COMMENT lines cfitsio writes into every new primary header.
const STANDARD_COMMENTS: &[&str] = &[
    "FITS (Flexible Image Transport System) format is",
    "and Astrophysics', volume 376, page 359",
];

/// `true` for keywords that describe the data array rather than the observation.
pub fn is_structural(keyword: &str) -> bool {
    let keyword = keyword.trim();
    STRUCTURAL_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(keyword))
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn is_commentary(keyword: &str) -> bool {
    matches!(keyword, "COMMENT" | "HISTORY" | "")
}

/// A header card value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int(i64),
    Float(f64),
    Logical(bool),
    Text(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Logical(_) => None,
            HeaderValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Value field of a record, everything after `= `. Quoted values are
    /// always text, so `'3000'` stays a string.
    fn parse_field(field: &str) -> Option<HeaderValue> {
        let field = field.trim_start();
        if let Some(body) = field.strip_prefix('\'') {
            let mut text = String::new();
            let mut chars = body.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '\'' {
                    text.push(c);
                } else if chars.peek() == Some(&'\'') {
                    chars.next();
                    text.push('\'');
                } else {
                    break;
                }
            }
            return Some(HeaderValue::Text(text.trim_end().to_string()));
        }

        let token = field.split('/').next().unwrap_or_default().trim();
        match token {
            "" => None,
            "T" => Some(HeaderValue::Logical(true)),
            "F" => Some(HeaderValue::Logical(false)),
            _ => Some(
                token
                    .parse::<i64>()
                    .map(HeaderValue::Int)
                    .or_else(|_| token.replace(['D', 'd'], "E").parse::<f64>().map(HeaderValue::Float))
                    .unwrap_or_else(|_| HeaderValue::Text(token.to_string())),
            ),
        }
    }

    fn to_field(&self) -> String {
        match self {
            HeaderValue::Int(v) => format!("{:>20}", v),
            HeaderValue::Float(v) => format!("{:>20}", format_float(*v)),
            HeaderValue::Logical(v) => format!("{:>20}", if *v { "T" } else { "F" }),
            HeaderValue::Text(s) => {
                let printable: String = s
                    .chars()
                    .take(MAX_TEXT_LEN)
                    .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { ' ' })
                    .collect();
                format!("'{:<8}'", printable.replace('\'', "''"))
            }
        }
    }
}

/// Shortest representation that reads back as the same float and never as
/// an integer.
fn format_float(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-4..1e15).contains(&magnitude) {
        return format!("{:E}", v);
    }
    let mut text = v.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Int(v) => write!(f, "{}", v),
            HeaderValue::Float(v) => write!(f, "{}", v),
            HeaderValue::Logical(v) => f.write_str(if *v { "T" } else { "F" }),
            HeaderValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<usize> for HeaderValue {
    fn from(v: usize) -> Self {
        HeaderValue::Int(v as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<bool> for HeaderValue {
    fn from(v: bool) -> Self {
        HeaderValue::Logical(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Text(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::Text(v)
    }
}

/// One header card. Cards read from a file keep their original record and
/// are written back byte for byte until their value is changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    keyword: String,
    value: Option<HeaderValue>,
    record: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: impl Into<HeaderValue>) -> Self {
        Self {
            keyword: keyword.trim().to_uppercase(),
            value: Some(value.into()),
            record: None,
        }
    }

    /// Parse one 80-column record. `HIERARCH` long keywords are understood;
    /// COMMENT, HISTORY and blank-keyword cards carry no value.
    pub fn parse(record: &str) -> Self {
        let record = record.trim_end();
        let (keyword, field) = match record
            .strip_prefix("HIERARCH ")
            .and_then(|rest| rest.split_once('='))
        {
            Some((name, field)) => (name.trim().to_uppercase(), Some(field)),
            None => {
                let name = record.get(..8).unwrap_or(record).trim().to_uppercase();
                let field = record.get(8..).and_then(|rest| rest.strip_prefix('='));
                (name, field)
            }
        };
        let value = if is_commentary(&keyword) {
            None
        } else {
            field.and_then(HeaderValue::parse_field)
        };
        Self {
            keyword,
            value,
            record: Some(record.to_string()),
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn value(&self) -> Option<&HeaderValue> {
        self.value.as_ref()
    }

    /// The record to write: the original text, or one formatted from the value.
    pub fn to_record(&self) -> String {
        if let Some(record) = &self.record {
            return record.clone();
        }
        let field = self.value.as_ref().map(HeaderValue::to_field).unwrap_or_default();
        let record = if self.keyword.len() <= 8 {
            format!("{:<8}= {}", self.keyword, field)
        } else {
            format!("HIERARCH {} = {}", self.keyword, field)
        };
        record.chars().take(RECORD_LEN).collect()
    }

    fn matches(&self, keyword: &str) -> bool {
        !is_commentary(&self.keyword) && self.keyword.eq_ignore_ascii_case(keyword.trim())
    }
}

/// Ordered header cards. Keywords are stored upper-case and looked up
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHeader {
    cards: Vec<Card>,
}

impl FrameHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header from raw records as stored in a file. Structural keywords, the
    /// END card and the comment lines cfitsio adds to new files are dropped.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a str>) -> Self {
        let cards = records
            .into_iter()
            .map(Card::parse)
            .filter(|card| !is_structural(&card.keyword))
            .filter(|card| {
                card.keyword != "COMMENT"
                    || !card
                        .record
                        .as_deref()
                        .is_some_and(|r| STANDARD_COMMENTS.iter().any(|text| r.contains(text)))
            })
            .collect();
        Self { cards }
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|card| card.matches(keyword))
            .and_then(Card::value)
    }

    /// Text of a card, trimmed. Numeric cards are formatted.
    pub fn get_text(&self, keyword: &str) -> Option<String> {
        self.get(keyword).map(|v| v.to_string().trim().to_string())
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_f64)
    }

    /// Insert or replace a card, keeping the position of an existing one.
    pub fn set(&mut self, keyword: &str, value: impl Into<HeaderValue>) {
        let card = Card::new(keyword, value);
        match self.cards.iter_mut().find(|c| c.matches(keyword)) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    pub fn remove(&mut self, keyword: &str) -> Option<HeaderValue> {
        let idx = self.cards.iter().position(|c| c.matches(keyword))?;
        self.cards.remove(idx).value
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// Records in write order.
    pub fn records(&self) -> impl Iterator<Item = String> + '_ {
        self.cards.iter().map(Card::to_record)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
