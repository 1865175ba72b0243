// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use regex::Regex;
use snafu::ResultExt;

use crate::{Result, error::InvalidPatternSnafu};

/// Inclusion and exclusion patterns over rendered record text.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Filter {
    /// Compile both pattern lists. The first invalid pattern fails the whole
    /// filter.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: compile("inclusion", include)?,
            exclude: compile("exclusion", exclude)?,
        })
    }

    /// Whether a record with this text is emitted.
    ///
    /// Exclusion wins: a record matching any exclusion pattern is dropped even
    /// if it also matches an inclusion pattern.
    pub fn accepts(&self, text: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(text)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(text))
    }

    pub const fn is_pass_through(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn compile<S: AsRef<str>>(kind: &'static str, patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(pattern).context(InvalidPatternSnafu { kind, pattern })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(&[], &[], "anything", true ; "no patterns")]
    #[test_case(&["ERROR"], &[], "ERROR disk full", true ; "included")]
    #[test_case(&["ERROR"], &[], "INFO started", false ; "not included")]
    #[test_case(&["ERROR", "WARN"], &[], "WARN slow", true ; "any inclusion")]
    #[test_case(&[], &["DEBUG"], "DEBUG noise", false ; "excluded")]
    #[test_case(&["ERROR"], &["DEBUG"], "ERROR DEBUG trace", false ; "exclusion wins")]
    #[test_case(&[r"^id=\d+$"], &[], "id=42", true ; "anchored")]
    fn test_accepts(include: &[&str], exclude: &[&str], text: &str, expected: bool) {
        let filter = Filter::new(include, exclude).unwrap();
        assert_eq!(filter.accepts(text), expected);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Filter::new(&["ok"], &["(unclosed"]).unwrap_err();
        assert!(err.to_string().contains("exclusion pattern `(unclosed`"), "{err}");
    }

    #[test]
    fn test_pass_through() {
        let empty: &[&str] = &[];
        assert!(Filter::new(empty, empty).unwrap().is_pass_through());
        assert!(!Filter::new(&["x"], empty).unwrap().is_pass_through());
    }
}
