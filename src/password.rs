// Runestone passwords: splitting a password into per-device fragments and
// generating random passwords for teams created without one.

use rand::Rng;

/// Characters used for generated passwords (no 0/O, 1/l/I lookalikes).
pub const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
pub const GENERATED_PASSWORD_LEN: usize = 8;

/// Split a password into `count` ordered fragments, preferring whole words.
///
/// - `count <= 1`: the password itself, verbatim.
/// - At least `count` words: words are distributed as evenly as possible and
///   the first `words % count` fragments carry one extra word. Words inside a
///   fragment are joined by a single space.
/// - Fewer words than fragments: the words are re-joined with single spaces
///   and the result is split by character count, the first `len % count`
///   fragments carrying one extra character. Fragments may be empty when the
///   password is shorter than `count`.
pub fn split_password(password: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        return vec![password.to_string()];
    }

    let words: Vec<&str> = password.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new(); count];
    }

    if words.len() >= count {
        let base = words.len() / count;
        let rem = words.len() % count;
        let mut out = Vec::with_capacity(count);
        let mut idx = 0;
        for k in 0..count {
            let take = if k < rem { base + 1 } else { base };
            out.push(words[idx..idx + take].join(" "));
            idx += take;
        }
        return out;
    }

    split_by_chars(&words.join(" "), count)
}

fn split_by_chars(s: &str, count: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let base = chars.len() / count;
    let rem = chars.len() % count;

    let mut out = Vec::with_capacity(count);
    let mut start = 0;
    for k in 0..count {
        let take = base + usize::from(k < rem);
        out.push(chars[start..start + take].iter().collect());
        start += take;
    }
    out
}

/// Character length of the password once whitespace runs collapse to a
/// single space. This is the text the character split works on.
pub fn normalized_len(password: &str) -> usize {
    let mut len = 0;
    for (i, word) in password.split_whitespace().enumerate() {
        if i > 0 {
            len += 1;
        }
        len += word.chars().count();
    }
    len
}

/// Generate a random password of `len` characters from [`PASSWORD_ALPHABET`].
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}
