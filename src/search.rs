use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left readable inside encoded parameter values.
const VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The advanced search form. Serializes to the query string the search
/// selector understands; empty and false fields are dropped entirely.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keywords: String,
    pub author: String,
    pub nice_only: bool,
    pub favorites_only: bool,
    pub from_date: String,
    pub to_date: String,
    pub ordering: String,
}

impl SearchQuery {
    pub fn to_params(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        push_pair(&mut pairs, "keywords", &self.keywords);
        push_pair(&mut pairs, "author", &self.author);
        if self.nice_only {
            pairs.push(("nice_only", "true".into()));
        }
        if self.favorites_only {
            pairs.push(("favorites_only", "true".into()));
        }
        push_pair(&mut pairs, "from_date", &self.from_date);
        push_pair(&mut pairs, "to_date", &self.to_date);
        push_pair(&mut pairs, "ordering", &self.ordering);

        pairs
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn push_pair(pairs: &mut Vec<(&str, String)>, key: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    pairs.push((key, utf8_percent_encode(value, VALUE_SET).to_string()));
}

/// One-shot search from a bare term. `@name` targets an author, anything
/// else becomes a keyword search; both sort newest-first.
pub fn quick_search(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let parameter = match term.strip_prefix('@') {
        Some(author) if !author.is_empty() => {
            format!("author={}", utf8_percent_encode(author, VALUE_SET))
        }
        Some(_) => return None,
        None => format!("keywords={}", utf8_percent_encode(term, VALUE_SET)),
    };
    Some(format!("{parameter}&ordering=newer"))
}
