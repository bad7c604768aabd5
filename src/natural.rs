use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two strings in "natural" order.
///
/// Embedded digit runs are compared by their numeric value, everything else
/// character by character ignoring case. Whitespace runs of any length match
/// each other; a space facing a non-space sorts first. This gives the order a human expects
/// when looking at a table: "item2" comes before "item10".
pub fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut s1 = a.chars().peekable();
    let mut s2 = b.chars().peekable();

    let mut first_pass = true;
    loop {
        let had_space1 = skip_whitespace(&mut s1);
        let had_space2 = skip_whitespace(&mut s2);

        // Inside the strings a space only vanishes when both sides have one
        if !first_pass && had_space1 != had_space2 {
            return match (s1.peek(), s2.peek()) {
                (None, _) => Ordering::Less,
                (_, None) => Ordering::Greater,
                _ if had_space1 => Ordering::Less,
                _ => Ordering::Greater,
            };
        }
        first_pass = false;

        let both_digits = matches!(
            (s1.peek(), s2.peek()),
            (Some(c1), Some(c2)) if c1.is_ascii_digit() && c2.is_ascii_digit()
        );
        if both_digits {
            let n1 = take_digits(&mut s1);
            let n2 = take_digits(&mut s2);
            match compare_numeric_runs(&n1, &n2) {
                Ordering::Equal => continue,
                other => return other,
            }
        }

        match (s1.next(), s2.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(c1), Some(c2)) => {
                if c1 == c2 {
                    continue;
                }
                let u1 = fold_case(c1);
                let u2 = fold_case(c2);
                if u1 == u2 {
                    continue;
                }
                // Punctuation sorts before letters and digits
                return match (u1.is_alphanumeric(), u2.is_alphanumeric()) {
                    (false, true) => Ordering::Less,
                    (true, false) => Ordering::Greater,
                    _ => u1.cmp(&u2),
                };
            }
        }
    }
}

// True if anything was skipped
fn skip_whitespace(s: &mut Peekable<Chars>) -> bool {
    let mut skipped = false;
    while s.next_if(|c| c.is_whitespace()).is_some() {
        skipped = true;
    }
    skipped
}

fn take_digits(s: &mut Peekable<Chars>) -> String {
    let mut run = String::new();
    while let Some(c) = s.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

// Both runs hold ascii digits only. Leading zeros carry no value.
fn compare_numeric_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn fold_case(c: char) -> char {
    // Multi-char uppercase mappings (e.g. 'ß') are left alone
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}
