use crate::models::{Card, Note, Rating};
use crate::sentence::plain_sentence;
use crate::study::Study;
use crate::utils::{clear, read_line};
use anyhow::Result;
use std::collections::HashSet;
use std::io::{stdin, stdout, BufRead, Write};

const RATING_PROMPT: &str = "Rating [1] Again [2] Hard [3] Good [4] Easy: ";

/// Lets user review all due cards until there aren't anymore.
pub fn review(study: &Study) -> Result<()> {
    let mut stdout_lock = stdout().lock();
    let mut stdin_lock = stdin().lock();
    let path = study.store().path();
    if study.get_next_due_card(study.now())?.is_none() {
        writeln!(stdout_lock, "No cards due for review in {:?}", path)?;
        return Ok(());
    }
    clear(&mut stdout_lock)?;
    writeln!(stdout_lock, "Reviewing due cards in {:?}\n", path)?;

    let (num_reviews, num_cards) = review_due_cards(study, &mut stdin_lock, &mut stdout_lock)?;

    writeln!(
        stdout_lock,
        "{} review{} of {} card{}. Done.",
        num_reviews,
        if num_reviews == 1 { "" } else { "s" },
        num_cards,
        if num_cards == 1 { "" } else { "s" }
    )?;
    Ok(())
}

/// Shows the earliest due card until none is left. Cards failed during the
/// session come back once their learning step has passed. Returns the number
/// of reviews and of distinct cards.
fn review_due_cards<R, W>(study: &Study, stdin: &mut R, stdout: &mut W) -> Result<(usize, usize)>
where
    R: BufRead,
    W: Write,
{
    let mut cards = HashSet::new();
    let mut num_reviews = 0;
    while let Some((card, note)) = study.get_next_due_card(study.now())? {
        let rating = review_card(&card, &note, stdout, stdin)?;
        study.record_review(card.id, i64::from(u8::from(rating)))?;
        cards.insert(card.id);
        num_reviews += 1;
    }
    Ok((num_reviews, cards.len()))
}

// Lets user review card. An empty answer counts as Good.
fn review_card<R, W>(card: &Card, note: &Note, stdout: &mut W, stdin: &mut R) -> Result<Rating>
where
    R: BufRead,
    W: Write,
{
    let sides = card.sides(note);
    write!(stdout, "F: {}", sides.front)?;
    stdout.flush()?;
    let _: String = read_line(&mut *stdin)?;

    writeln!(stdout, "B: {}", sides.back)?;
    if !note.sentence.is_empty() {
        writeln!(stdout, "   {}", plain_sentence(&note.sentence))?;
        writeln!(stdout, "   {}", note.sentence_translation)?;
    }

    let rating = loop {
        write!(stdout, "{}", RATING_PROMPT)?;
        stdout.flush()?;
        let answer = read_line(&mut *stdin)?;
        let answer = answer.trim();
        if answer.is_empty() {
            break Rating::Good;
        }
        match answer.parse::<i64>().ok().map(Rating::try_from) {
            Some(Ok(rating)) => break rating,
            _ => writeln!(stdout, "Please answer 1, 2, 3 or 4.")?,
        }
    };
    writeln!(stdout)?;
    clear(stdout)?;
    stdout.flush()?;
    Ok(rating)
}

#[cfg(test)]
fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
}

#[cfg(test)]
fn sample_note() -> crate::models::NoteDraft {
    crate::models::NoteDraft {
        word: String::from("perro"),
        translation: String::from("dog"),
        sentence: String::from("Mi perro ladra."),
        sentence_translation: String::from("My dog barks."),
    }
}

#[test]
fn test_review_card() {
    use crate::study::test_study;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let (study, _) = test_study(dir.path(), fixed_now());
    let (note, [_, reverse]) = study.create_note(sample_note()).unwrap();
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n7\nbueno\n2\n");
    let result = review_card(&reverse, &note, &mut stdout, &mut stdin);

    // Check result: invalid answers are asked again
    assert_eq!(result.unwrap(), Rating::Hard);

    // Check prompts: reverse cards show the translation first
    let stdout_vec = stdout.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&stdout_vec),
        format!(
            "F: dogB: perro\n   Mi perro ladra.\n   My dog barks.\n\
        {p}Please answer 1, 2, 3 or 4.\n\
        {p}Please answer 1, 2, 3 or 4.\n\
        {p}\n\u{1b}[2J\u{1b}[1;1H",
            p = RATING_PROMPT
        )
    );
}

#[test]
fn test_empty_answer_counts_as_good() {
    use crate::study::test_study;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let (study, _) = test_study(dir.path(), fixed_now());
    let (note, [forward, _]) = study.create_note(sample_note()).unwrap();
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n\n");
    let result = review_card(&forward, &note, &mut stdout, &mut stdin);
    assert_eq!(result.unwrap(), Rating::Good);
}

#[test]
fn test_review_due_cards_until_none_is_left() {
    use crate::study::test_study;
    use chrono::Duration;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let (study, clock) = test_study(dir.path(), fixed_now());
    study.create_note(sample_note()).unwrap();

    // Both directions are due right away, Good moves them to the next step
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n3\n\n3\n");
    let counts = review_due_cards(&study, &mut stdin, &mut stdout).unwrap();
    assert_eq!(counts, (2, 2));
    let snapshot = study.snapshot().unwrap();
    let reviewed: Vec<u64> = snapshot.review_logs.iter().map(|l| l.card_id).collect();
    assert_eq!(reviewed, vec![1, 2]);

    // Nothing is due until the ten minute step has passed
    let mut stdin = Cursor::new(b"");
    assert_eq!(review_due_cards(&study, &mut stdin, &mut stdout).unwrap(), (0, 0));
    clock.advance(Duration::minutes(10));
    let mut stdin = Cursor::new(b"\n4\n\n4\n");
    assert_eq!(review_due_cards(&study, &mut stdin, &mut stdout).unwrap(), (2, 2));
    assert_eq!(study.snapshot().unwrap().review_logs.len(), 4);
}
