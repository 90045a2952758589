use std::fmt::Write;

///
/// CacheKeys
///
/// Key scheme for one report instance. Every key carries the
/// `{report}:{instance}:` prefix so a whole instance (or a whole report)
/// deletes with one prefix sweep.
///
/// Layout:
/// - `{report}:{instance}:`                creation timestamp ("started")
/// - `{report}:{instance}:ids:`            row-id order list
/// - `{report}:{instance}:{n}`             row map for row id n
/// - `{report}:{instance}:index:{column}:` sort index for one column
/// - `{report}:{instance}:footer:`         footer row
/// - `{report}:{instance}:_done:`          completion marker, written last
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    #[must_use]
    pub fn new(report: &str, instance_id: &str) -> Self {
        Self {
            prefix: format!("{report}:{instance_id}:"),
        }
    }

    /// Prefix shared by every instance of a report.
    #[must_use]
    pub fn report_prefix(report: &str) -> String {
        format!("{report}:")
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Instance root; holds the creation timestamp and marks "started".
    #[must_use]
    pub fn root(&self) -> String {
        self.prefix.clone()
    }

    #[must_use]
    pub fn ids(&self) -> String {
        format!("{}ids:", self.prefix)
    }

    #[must_use]
    pub fn row(&self, row_id: u64) -> String {
        let mut key = self.prefix.clone();
        let _ = write!(key, "{row_id}");
        key
    }

    #[must_use]
    pub fn index(&self, column: &str) -> String {
        format!("{}index:{column}:", self.prefix)
    }

    #[must_use]
    pub fn footer(&self) -> String {
        format!("{}footer:", self.prefix)
    }

    #[must_use]
    pub fn done(&self) -> String {
        format!("{}_done:", self.prefix)
    }
}

///
/// TESTS
///
