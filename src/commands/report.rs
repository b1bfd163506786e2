use crate::api::Mode;
use crate::args::{CompareArgs, ReportArgs};
use crate::commands::{open_ledger, Out};
use crate::model::group_digits;
use crate::report::{CategoryTotal, ComparisonReport, MonthlyReport};
use crate::Config;
use anyhow::{Context, Result};
use std::fmt::Write;

/// Computes the balance report of one month, the current one unless `args` names another.
pub async fn report(config: Config, mode: Mode, args: ReportArgs) -> Result<Out<MonthlyReport>> {
    let ledger = open_ledger(&config, mode).await?;
    let report = match args.month() {
        Some(month) => ledger.monthly_report(month.year(), month.month()).await,
        None => ledger.current_monthly_report().await,
    }
    .context("Unable to compute the monthly report")?;
    Ok(Out::new(render_monthly(&report), report))
}

/// Compares two months, by default the current one against the one before it.
pub async fn compare(
    config: Config,
    mode: Mode,
    args: CompareArgs,
) -> Result<Out<ComparisonReport>> {
    let ledger = open_ledger(&config, mode).await?;
    let result = match (args.current(), args.previous()) {
        (None, None) => ledger.comparison_report().await,
        (current, previous) => {
            let current = current.unwrap_or_else(|| ledger.current_period());
            let previous = previous.unwrap_or_else(|| current.previous());
            ledger
                .compare(
                    current.year(),
                    current.month(),
                    previous.year(),
                    previous.month(),
                )
                .await
        }
    };
    let report = result.context("Unable to compute the comparison report")?;
    Ok(Out::new(render_comparison(&report), report))
}

fn money(value: i128) -> String {
    group_digits(value)
}

/// A share in percent, e.g. `42.5%`.
fn share(percent: f64) -> String {
    format_num::format_num!(".1%", percent / 100.0)
}

fn render_categories(out: &mut String, title: &str, totals: &[CategoryTotal]) {
    if totals.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}:");
    for total in totals {
        let _ = writeln!(
            out,
            "  {:<20} {:>15} {:>7}",
            total.category(),
            money(total.total().into()),
            share(total.share())
        );
    }
}

fn render_monthly(report: &MonthlyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report for {}", report.period());
    let _ = writeln!(out, "  Opening balance  {:>15}", money(report.opening_balance()));
    let _ = writeln!(out, "  Income           {:>15}", money(report.income_total().into()));
    let _ = writeln!(out, "  Expense          {:>15}", money(report.expense_total().into()));
    let _ = writeln!(out, "  Closing balance  {:>15}", money(report.closing_balance()));
    let _ = writeln!(out, "  Transactions     {:>15}", report.transaction_count());
    render_categories(&mut out, "Expense by category", report.expense_by_category());
    render_categories(&mut out, "Income by category", report.income_by_category());
    out.trim_end().to_string()
}

fn render_comparison(report: &ComparisonReport) -> String {
    let current = report.current();
    let previous = report.previous();
    let mut out = String::new();
    let _ = writeln!(out, "{} compared to {}", current.period(), previous.period());
    let _ = writeln!(
        out,
        "  Income   {:>15} vs {:>15}  {}",
        money(current.income_total().into()),
        money(previous.income_total().into()),
        report.income_change()
    );
    let _ = writeln!(
        out,
        "  Expense  {:>15} vs {:>15}  {}",
        money(current.expense_total().into()),
        money(previous.expense_total().into()),
        report.expense_change()
    );
    if !report.categories().is_empty() {
        let _ = writeln!(out, "Expense by category:");
    }
    for category in report.categories() {
        let _ = writeln!(
            out,
            "  {:<20} {:>15} vs {:>15}  {}",
            category.category(),
            money(category.current().into()),
            money(category.previous().into()),
            category.change()
        );
    }
    out.trim_end().to_string()
}
