//! "Did you mean?" hints for missing implementations

use crate::binding::{Binding, Source};
use crate::key::Key;

/// Upper bound on related-type hints.
const MAX_RELATED_TYPES_REPORTED: usize = 3;

/// Minimum edit-distance allowance, so very short qualifiers still match.
const MIN_DISTANCE_ALLOWANCE: usize = 3;

/// Hint lines for a key nothing is bound to.
///
/// Bindings sharing the missing key's raw type are ranked by the edit distance
/// between qualifier renderings. Close candidates are listed nearest first,
/// ties keeping binding order, up to `max_suggestions`; the rest are
/// summarized in one trailing line. Without any same-type binding, bindings
/// whose type name overlaps the missing one are listed instead.
pub(crate) fn missing_implementation_hints<'a, I>(
	missing: &Key,
	bindings: I,
	max_suggestions: usize,
) -> Vec<String>
where
	I: IntoIterator<Item = &'a Binding>,
{
	let bindings: Vec<&Binding> = bindings
		.into_iter()
		.filter(|b| b.key() != missing)
		.collect();

	let same_type: Vec<&Binding> = bindings
		.iter()
		.copied()
		.filter(|b| b.key().raw_name() == missing.raw_name())
		// A qualified miss is only compared against other qualified bindings.
		.filter(|b| missing.qualifier().is_none() || b.key().qualifier().is_some())
		.collect();

	if same_type.is_empty() {
		return related_types(missing, &bindings);
	}

	let wanted = missing.qualifier_string();
	let allowance = wanted.chars().count().max(MIN_DISTANCE_ALLOWANCE);

	let mut close: Vec<(usize, &Binding)> = same_type
		.iter()
		.map(|b| (strsim::levenshtein(&wanted, &b.key().qualifier_string()), *b))
		.filter(|(distance, _)| *distance < allowance)
		.collect();
	// Stable, so equal distances keep binding order.
	close.sort_by_key(|(distance, _)| *distance);
	close.truncate(max_suggestions);

	let mut hints: Vec<String> = close
		.iter()
		.map(|(_, b)| format!("* {}", describe(b.key(), b.source())))
		.collect();

	let remaining = same_type.len() - hints.len();
	if remaining > 0 {
		hints.push(format!(
			"{} more binding{} with other annotations.",
			remaining,
			if remaining == 1 { "" } else { "s" }
		));
	}
	hints
}

fn related_types(missing: &Key, bindings: &[&Binding]) -> Vec<String> {
	let wanted = missing.type_literal().to_string().to_lowercase();
	let wanted_raw = missing.raw_name().to_lowercase();
	let related: Vec<&Binding> = bindings
		.iter()
		.copied()
		.filter(|b| {
			let have = b.key().type_literal().to_string().to_lowercase();
			have.contains(&wanted_raw) || wanted.contains(&b.key().raw_name().to_lowercase())
		})
		.collect();

	if related.is_empty() || related.len() > MAX_RELATED_TYPES_REPORTED {
		return Vec::new();
	}
	related
		.iter()
		.map(|b| format!("* {}", describe(b.key(), b.source())))
		.collect()
}

fn describe(key: &Key, source: Source) -> String {
	if source.is_code() {
		format!("{} bound at {}", key, source)
	} else {
		format!("{} ({})", key, source)
	}
}
