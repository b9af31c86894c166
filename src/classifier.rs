//! Resolves a file path to its destination category.

use crate::file_category::{Category, ExtensionTable};
use crate::rules::RuleSet;
use std::path::Path;

/// Custom rules first, then the extension table, then `Miscellaneous`.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: RuleSet,
    table: ExtensionTable,
}

impl Classifier {
    pub fn new(rules: RuleSet, table: ExtensionTable) -> Self {
        Self { rules, table }
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self::new(rules, ExtensionTable::default())
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn table(&self) -> &ExtensionTable {
        &self.table
    }

    /// Classifies `path` by its file name. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use filesorter::classifier::Classifier;
    /// use filesorter::file_category::Category;
    /// use filesorter::rules::RuleSet;
    /// use std::path::Path;
    ///
    /// let classifier = Classifier::with_rules(RuleSet::from_pairs([("invoice", "Finance")]));
    /// assert_eq!(
    ///     classifier.classify(Path::new("invoice_report.txt")),
    ///     Category::Custom("Finance".to_string())
    /// );
    /// assert_eq!(classifier.classify(Path::new("notes.txt")), Category::Documents);
    /// assert_eq!(classifier.classify(Path::new("blob.xyz")), Category::Miscellaneous);
    /// ```
    pub fn classify(&self, path: &Path) -> Category {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if let Some(rule) = self.rules.first_match(&file_name) {
            return Category::from_label(&rule.label);
        }

        if let Some(ext) = path.extension()
            && let Some(category) = self.table.lookup(&ext.to_string_lossy())
        {
            return category;
        }

        Category::Miscellaneous
    }
}
