use colored::Colorize;

use crate::logger::RunLogger;
use crate::runner::types::RunTotals;

/// 运行结束后的汇总输出
///
/// 两行统计各自保持固定形状，方便脚本里直接 grep
/// `failed: N` 判断运行结果。
pub struct SummaryReporter;

impl SummaryReporter {
    pub fn print(totals: &RunTotals, logger: &RunLogger) {
        logger.info("━".repeat(50));
        logger.info(format!(
            "{} total: {}, ok: {}, failed: {}",
            format!("{:<9}", "Requests:").bold(),
            totals.requests_total,
            totals.requests_ok,
            totals.requests_failed
        ));
        logger.info(format!(
            "{} total: {}, ok: {}, failed: {}",
            format!("{:<9}", "Tests:").bold(),
            totals.tests_total,
            totals.tests_ok,
            totals.tests_failed
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_shape_is_greppable() {
        let logger = RunLogger::captured(false);
        let mut totals = RunTotals::default();
        totals.record_request(true);
        totals.record_request(false);
        totals.record_test(true);

        SummaryReporter::print(&totals, &logger);
        let output = logger.take_output().join("\n");
        assert!(output.contains("total: 2, ok: 1, failed: 1"));
        assert!(output.contains("total: 1, ok: 1, failed: 0"));
        assert!(output.contains("Requests:"));
        assert!(output.contains("Tests:"));
    }
}
