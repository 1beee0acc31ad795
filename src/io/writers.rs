//! CSV writers for trades, execution reports, risk events and P&L
//! snapshots. Generic over any `io::Write`; the `create` constructors open
//! buffered files and write the header immediately.

use crate::pnl::PnlSnapshot;
use crate::risk::RiskEvent;
use crate::types::{ExecutionResult, Order, Trade};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// `trade_id,timestamp,buy_order_id,sell_order_id,price,quantity`
pub struct TradeWriter<W: Write> {
    out: W,
    written: u64,
}

impl TradeWriter<BufWriter<File>> {
    /// Creates (truncating) `path` and writes the header.
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> TradeWriter<W> {
    /// Wraps a sink and writes the header.
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "trade_id,timestamp,buy_order_id,sell_order_id,price,quantity")?;
        Ok(Self { out, written: 0 })
    }

    pub fn write_trade(&mut self, trade: &Trade) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{},{}",
            trade.trade_id,
            trade.timestamp,
            trade.buy_order_id,
            trade.sell_order_id,
            trade.price,
            trade.quantity
        )?;
        self.written += 1;
        Ok(())
    }

    /// Number of trades written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// `order_id,timestamp,type,side,status,reject_reason,filled_qty,remaining_qty,trade_count,avg_price`
pub struct ExecutionReportWriter<W: Write> {
    out: W,
    written: u64,
}

impl ExecutionReportWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ExecutionReportWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(
            out,
            "order_id,timestamp,type,side,status,reject_reason,filled_qty,remaining_qty,trade_count,avg_price"
        )?;
        Ok(Self { out, written: 0 })
    }

    /// One report line per submission; `avg_price` is volume-weighted at
    /// two decimals, 0 when nothing filled.
    pub fn write_report(&mut self, order: &Order, result: &ExecutionResult) -> io::Result<()> {
        let reject_reason = result
            .reject_reason
            .map_or("none", |reason| reason.as_str());
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{:.2}",
            order.id,
            order.timestamp,
            order.kind,
            order.side,
            result.status,
            reject_reason,
            result.filled_quantity,
            result.remaining_quantity,
            result.trades.len(),
            result.avg_fill_price()
        )?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// `event_id,timestamp,order_id,client_id,event_type,current_value,limit_value,requested_value,details`
pub struct RiskEventWriter<W: Write> {
    out: W,
    written: u64,
}

impl RiskEventWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> RiskEventWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(
            out,
            "event_id,timestamp,order_id,client_id,event_type,current_value,limit_value,requested_value,details"
        )?;
        Ok(Self { out, written: 0 })
    }

    pub fn write_event(&mut self, event: &RiskEvent) -> io::Result<()> {
        // Keep the record single-line and comma-safe.
        let details: String = event
            .details
            .chars()
            .map(|c| if c == ',' || c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{}",
            event.event_id,
            event.timestamp,
            event.order_id,
            event.client_id,
            event.kind.as_str(),
            event.current_value,
            event.limit_value,
            event.requested_value,
            details
        )?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// `snapshot_id,timestamp,client_id,net_position,long_qty,short_qty,realized_pnl,unrealized_pnl,total_pnl,mark_price,cost_basis,avg_entry_price,trade_id`
pub struct PnlWriter<W: Write> {
    out: W,
    written: u64,
}

impl PnlWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> PnlWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(
            out,
            "snapshot_id,timestamp,client_id,net_position,long_qty,short_qty,realized_pnl,unrealized_pnl,total_pnl,mark_price,cost_basis,avg_entry_price,trade_id"
        )?;
        Ok(Self { out, written: 0 })
    }

    pub fn write_snapshot(&mut self, snapshot: &PnlSnapshot) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            snapshot.snapshot_id,
            snapshot.timestamp,
            snapshot.client_id,
            snapshot.net_position,
            snapshot.long_quantity,
            snapshot.short_quantity,
            snapshot.realized_pnl,
            snapshot.unrealized_pnl,
            snapshot.total_pnl,
            snapshot.mark_price,
            snapshot.cost_basis,
            snapshot.avg_entry_price,
            snapshot.trade_id
        )?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
