//! Order-file parser.
//!
//! Line format (header present):
//! `id,timestamp,type,side,price,quantity[,client_id]` with
//! case-insensitive `type` and `side` (`buy|b|sell|s`). Blank lines are
//! skipped; malformed lines are counted as parse errors and never abort
//! ingestion. Files past a size threshold are split at line boundaries and
//! parsed on multiple threads.

use crate::types::{Order, OrderKind, Side, TimeInForce};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Files at or above this size are parsed in parallel partitions.
const PARALLEL_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

/// CSV order parser with per-run error accounting.
#[derive(Debug, Default)]
pub struct OrderCsvParser {
    parse_errors: usize,
    lines_processed: usize,
}

impl OrderCsvParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines that failed to parse in the last run.
    #[must_use]
    pub fn parse_error_count(&self) -> usize {
        self.parse_errors
    }

    /// Non-blank data lines seen in the last run.
    #[must_use]
    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    /// Parses a whole order file. Invalid lines are skipped and counted.
    ///
    /// # Errors
    /// Only on I/O failure opening or reading the file.
    pub fn parse_file(&mut self, path: &Path) -> io::Result<Vec<Order>> {
        let content = fs::read_to_string(path)?;
        if content.len() >= PARALLEL_THRESHOLD_BYTES {
            Ok(self.parse_content_parallel(&content))
        } else {
            Ok(self.parse_content(&content))
        }
    }

    /// Parses in-memory CSV content (header expected on the first line).
    pub fn parse_content(&mut self, content: &str) -> Vec<Order> {
        self.parse_errors = 0;
        self.lines_processed = 0;

        let mut orders = Vec::new();
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            self.lines_processed += 1;
            match parse_line(line) {
                Some(order) if order.validate().is_none() => orders.push(order),
                _ => {
                    self.parse_errors += 1;
                    warn!(line, "skipping malformed order line");
                }
            }
        }
        orders
    }

    /// Splits the content at line boundaries into one partition per
    /// available core and parses partitions independently.
    fn parse_content_parallel(&mut self, content: &str) -> Vec<Order> {
        self.parse_errors = 0;
        self.lines_processed = 0;

        let data_start = match content.find('\n') {
            Some(header_end) => header_end + 1,
            None => return Vec::new(),
        };
        let body = &content[data_start..];

        let partitions = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        let chunks = split_at_line_boundaries(body, partitions);
        debug!(partitions = chunks.len(), bytes = body.len(), "parallel parse");

        let outcomes: Vec<(Vec<Order>, usize, usize)> = std::thread::scope(|scope| {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|chunk| scope.spawn(move || parse_chunk(chunk)))
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut orders = Vec::new();
        for (mut chunk_orders, errors, lines) in outcomes {
            orders.append(&mut chunk_orders);
            self.parse_errors += errors;
            self.lines_processed += lines;
        }
        orders
    }
}

fn parse_chunk(chunk: &str) -> (Vec<Order>, usize, usize) {
    let mut orders = Vec::new();
    let mut errors = 0;
    let mut lines = 0;
    for line in chunk.lines() {
        if line.trim().is_empty() {
            continue;
        }
        lines += 1;
        match parse_line(line) {
            Some(order) if order.validate().is_none() => orders.push(order),
            _ => errors += 1,
        }
    }
    (orders, errors, lines)
}

/// Splits `body` into at most `parts` chunks, cutting only at newlines.
fn split_at_line_boundaries(body: &str, parts: usize) -> Vec<&str> {
    if body.is_empty() {
        return Vec::new();
    }
    let target = (body.len() / parts.max(1)).max(1);
    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    while start < body.len() {
        let tentative_end = (start + target).min(body.len());
        let end = if tentative_end >= body.len() {
            body.len()
        } else {
            match body[tentative_end..].find('\n') {
                Some(offset) => tentative_end + offset + 1,
                None => body.len(),
            }
        };
        chunks.push(&body[start..end]);
        start = end;
    }
    chunks
}

/// Parses one CSV line into an [`Order`]; `None` on any malformed field.
#[must_use]
pub fn parse_line(line: &str) -> Option<Order> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return None;
    }

    let id: u64 = fields[0].parse().ok()?;
    let timestamp: u64 = fields[1].parse().ok()?;
    let kind = parse_order_kind(fields[2])?;
    let side = parse_side(fields[3])?;
    let price: i64 = fields[4].parse().ok()?;
    let quantity: u64 = fields[5].parse().ok()?;
    let client_id: u64 = match fields.get(6) {
        Some(field) if !field.is_empty() => field.parse().ok()?,
        _ => 0,
    };

    let mut order = Order {
        id,
        timestamp,
        kind,
        side,
        price,
        quantity,
        tif: TimeInForce::Gtc,
        client_id,
        target_order_id: 0,
        new_price: 0,
        new_quantity: 0,
    };
    // Cancel and modify rows target the order named in the `id` column;
    // for modifies, price/quantity carry the new values.
    match kind {
        OrderKind::Cancel => order.target_order_id = id,
        OrderKind::Modify => {
            order.target_order_id = id;
            order.new_price = price;
            order.new_quantity = quantity;
        }
        OrderKind::Market => order.tif = TimeInForce::Ioc,
        OrderKind::Limit => {}
    }
    Some(order)
}

fn parse_order_kind(field: &str) -> Option<OrderKind> {
    if field.eq_ignore_ascii_case("market") {
        Some(OrderKind::Market)
    } else if field.eq_ignore_ascii_case("limit") {
        Some(OrderKind::Limit)
    } else if field.eq_ignore_ascii_case("cancel") {
        Some(OrderKind::Cancel)
    } else if field.eq_ignore_ascii_case("modify") {
        Some(OrderKind::Modify)
    } else {
        None
    }
}

fn parse_side(field: &str) -> Option<Side> {
    if field.eq_ignore_ascii_case("buy") || field.eq_ignore_ascii_case("b") {
        Some(Side::Buy)
    } else if field.eq_ignore_ascii_case("sell") || field.eq_ignore_ascii_case("s") {
        Some(Side::Sell)
    } else {
        None
    }
}
