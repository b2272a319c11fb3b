//! Issue templates for the built-in checks.

use watchpost_core::{FurtherInfo, Issue, Severity};

/// Fixed part of a finding. `{name}` placeholders in the text are filled
/// by [`Template::render`].
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub code: &'static str,
    pub summary: &'static str,
    pub description: &'static str,
    pub severity: Severity,
}

impl Template {
    /// Issue with the template text as-is.
    pub fn issue(&self, url: &str, links: &[(&str, &str)]) -> Issue {
        self.render(url, links, &[])
    }

    /// Issue with `{key}` placeholders replaced in summary and description.
    pub fn render(&self, url: &str, links: &[(&str, &str)], values: &[(&str, &str)]) -> Issue {
        Issue::new(
            self.code,
            self.severity,
            fill(self.summary, values),
            fill(self.description, values),
        )
        .with_url(url)
        .with_further_info(further_info(links))
    }
}

fn fill(text: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(text.to_owned(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

fn further_info(links: &[(&str, &str)]) -> Vec<FurtherInfo> {
    links
        .iter()
        .map(|(url, title)| FurtherInfo {
            url: (*url).to_owned(),
            title: (*title).to_owned(),
        })
        .collect()
}
