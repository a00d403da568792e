//! Answer evaluation: text normalization, fuzzy phrase matching, and point awards.
//!
//! The evaluator is a pure function of the guess, the normalized targets, and
//! the duration category of the last fragment played this round.

use crate::state::game::FragmentLength;

/// Points awarded when the whole title/artist pair is found after a 3s fragment.
const BASE_POINTS_3S: u32 = 100;
const BASE_POINTS_5S: u32 = 70;
const BASE_POINTS_7S: u32 = 50;
const BASE_POINTS_FULL: u32 = 30;
/// Fallback when the host has not played any fragment yet this round.
const BASE_POINTS_NONE: u32 = 20;

/// Outcome of scoring a single guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Points to award; zero means the guess missed both targets.
    pub points: u32,
    /// Whether the guess matched the song title.
    pub title_matched: bool,
    /// Whether the guess matched the artist.
    pub artist_matched: bool,
}

/// Lowercase, fold diacritics, drop everything outside `[a-z0-9 ]`, and
/// collapse whitespace into single-spaced tokens.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        for lowered in c.to_lowercase() {
            match fold_diacritic(lowered) {
                c @ ('a'..='z' | '0'..='9') => out.push(c),
                c if c.is_whitespace() => out.push(' '),
                _ => {}
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map Latin-1 accented letters onto their unaccented counterpart.
///
/// Equivalent to NFD decomposition followed by stripping combining marks for
/// the alphabets song catalogues actually contain.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Base points for the duration category most recently broadcast.
pub fn base_points(last_fragment: Option<FragmentLength>) -> u32 {
    match last_fragment {
        Some(FragmentLength::Seconds3) => BASE_POINTS_3S,
        Some(FragmentLength::Seconds5) => BASE_POINTS_5S,
        Some(FragmentLength::Seconds7) => BASE_POINTS_7S,
        Some(FragmentLength::Full) => BASE_POINTS_FULL,
        None => BASE_POINTS_NONE,
    }
}

/// Score `guess` against the normalized `title` and `artist` targets.
///
/// Both targets found awards the full base points for the fragment duration;
/// title alone awards 3/4 of it, artist alone half, rounded half-up.
pub fn evaluate(
    guess: &str,
    title: &str,
    artist: &str,
    last_fragment: Option<FragmentLength>,
) -> Evaluation {
    let guess = normalize(guess);
    let guess_tokens: Vec<&str> = guess.split(' ').filter(|t| !t.is_empty()).collect();

    let title_matched = phrase_matches(&guess_tokens, title);
    let artist_matched = phrase_matches(&guess_tokens, artist);

    let base = base_points(last_fragment);
    let points = match (title_matched, artist_matched) {
        (true, true) => base,
        (true, false) => round_half_up(base, 0.75),
        (false, true) => round_half_up(base, 0.5),
        (false, false) => 0,
    };

    Evaluation {
        points,
        title_matched,
        artist_matched,
    }
}

/// Token-boundary-aligned contiguous-run containment, in either direction.
///
/// A guess matches a target phrase when the target's full token sequence
/// appears as a contiguous run inside the guess, or the guess's full token
/// sequence appears as a contiguous run inside the target. Word-set overlap
/// and scrambled orderings do not count.
fn phrase_matches(guess_tokens: &[&str], target: &str) -> bool {
    let target_tokens: Vec<&str> = target.split(' ').filter(|t| !t.is_empty()).collect();
    contains_run(guess_tokens, &target_tokens) || contains_run(&target_tokens, guess_tokens)
}

/// Whether `needle` appears in `haystack` as a contiguous token run.
fn contains_run(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn round_half_up(base: u32, factor: f64) -> u32 {
    (f64::from(base) * factor).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(guess: &str, last: Option<FragmentLength>) -> Evaluation {
        evaluate(
            guess,
            &normalize("Billie Jean"),
            &normalize("Michael Jackson"),
            last,
        )
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("La Canción, ¡Más Épica!"), "la cancion mas epica");
        assert_eq!(normalize("  Billie   JEAN "), "billie jean");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn title_only_after_three_seconds() {
        let result = eval("billie jean", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 75);
        assert!(result.title_matched);
        assert!(!result.artist_matched);
    }

    #[test]
    fn title_and_artist_award_full_base_points() {
        let result = eval("billie jean michael jackson", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 100);
        assert!(result.title_matched);
        assert!(result.artist_matched);
    }

    #[test]
    fn unrelated_guess_scores_zero() {
        let result = eval("thriller", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 0);
        assert!(!result.title_matched);
        assert!(!result.artist_matched);
    }

    #[test]
    fn single_token_subsequence_matches_artist() {
        let result = eval("jackson", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 50);
        assert!(!result.title_matched);
        assert!(result.artist_matched);
    }

    #[test]
    fn scrambled_tokens_do_not_match() {
        let result = eval("jean billie", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 0);
    }

    #[test]
    fn partial_token_does_not_match() {
        let result = eval("jack", Some(FragmentLength::Seconds3));
        assert_eq!(result.points, 0);
    }

    #[test]
    fn empty_guess_scores_zero() {
        let result = eval("   ", Some(FragmentLength::Full));
        assert_eq!(result.points, 0);
    }

    #[test]
    fn scaled_points_round_half_up() {
        // 70 * 0.75 = 52.5 rounds to 53, 50 * 0.75 = 37.5 rounds to 38.
        assert_eq!(eval("billie jean", Some(FragmentLength::Seconds5)).points, 53);
        assert_eq!(eval("billie jean", Some(FragmentLength::Seconds7)).points, 38);
        assert_eq!(eval("michael jackson", Some(FragmentLength::Seconds5)).points, 35);
    }

    #[test]
    fn fallback_base_when_no_fragment_played() {
        assert_eq!(eval("billie jean michael jackson", None).points, 20);
        assert_eq!(eval("billie jean", None).points, 15);
        assert_eq!(eval("michael jackson", None).points, 10);
    }

    #[test]
    fn full_song_playback_awards_lowest_base() {
        assert_eq!(
            eval("billie jean michael jackson", Some(FragmentLength::Full)).points,
            30
        );
    }

    #[test]
    fn accented_guess_matches_plain_target() {
        let result = evaluate(
            "La Macarena, ¡sí!",
            &normalize("La Macarena"),
            &normalize("Los del Río"),
            Some(FragmentLength::Seconds3),
        );
        assert_eq!(result.points, 75);
    }
}
