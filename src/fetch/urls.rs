// src/fetch/urls.rs

/// Expand `template` once per year in `first..=last`, replacing `{year}`.
pub fn yearly_urls(template: &str, first: u16, last: u16) -> Vec<String> {
    (first..=last)
        .map(|year| template.replace("{year}", &year.to_string()))
        .collect()
}
