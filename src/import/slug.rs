use pneu_types::product::SlugLookup;

/// Lowercase ASCII slug: accented latin characters are folded, anything else
/// non-alphanumeric collapses into single hyphens.
pub fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut prev_dash = false;
    for ch in input.to_lowercase().chars() {
        let mapped = match ch {
            'à' | 'â' | 'ä' => "a",
            'é' | 'è' | 'ê' | 'ë' => "e",
            'î' | 'ï' => "i",
            'ô' | 'ö' => "o",
            'ù' | 'û' | 'ü' => "u",
            'ç' => "c",
            'œ' => "oe",
            'æ' => "ae",
            _ => "",
        };
        if !mapped.is_empty() {
            out.push_str(mapped);
            prev_dash = false;
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_dash = false;
            continue;
        }
        if !prev_dash && !out.is_empty() {
            out.push('-');
            prev_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Turns a desired base into a slug no existing catalog entry uses.
///
/// The lookup is re-evaluated against the live store on every probe: two rows
/// of the same batch may want the same base, so earlier creations of the run
/// must be visible here.
pub async fn allocate_slug<L>(lookup: &L, base: &str) -> Result<String, anyhow::Error>
where
    L: SlugLookup + ?Sized,
{
    let base = match slugify(base) {
        s if s.is_empty() => "pneu".to_string(),
        s => s,
    };
    if !lookup.slug_exists(&base).await? {
        return Ok(base);
    }
    let mut counter = 1usize;
    loop {
        let candidate = format!("{base}-{counter}");
        if !lookup.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}
