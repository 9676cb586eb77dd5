use crate::models::{NoteDraft, Snapshot};
use crate::sentence::{plain_sentence, SentenceSource};
use crate::study::Study;
use crate::utils::read_line;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{stdin, stdout, BufRead, Write};

struct NoopWriter {}

impl Write for NoopWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Lets user add as many new notes as they want. An empty word stops.
pub fn add(study: &Study, source: &dyn SentenceSource, silent: bool) -> Result<()> {
    let path = study.store().path();
    if !path.exists() {
        return Err(anyhow!(
            "File {:?} doesn't exist. Use `repaso init` to create it. Aborting.",
            path
        ));
    }
    let tables = build_lookup_tables(&study.snapshot()?)?;
    let mut stdout_lock: Box<dyn Write> = if silent {
        Box::new(NoopWriter {})
    } else {
        Box::new(stdout().lock())
    };
    let mut stdin_lock = stdin().lock();
    add_notes(study, source, &mut stdin_lock, &mut stdout_lock, tables)
}

fn prompt<R, W>(label: &str, stdin: &mut R, stdout: &mut W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;
    Ok(read_line(&mut *stdin)?.trim().to_string())
}

fn add_notes<R, W>(
    study: &Study,
    source: &dyn SentenceSource,
    mut stdin: R,
    mut stdout: W,
    (mut words, mut translations): (HashMap<String, u64>, HashMap<String, u64>),
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    loop {
        let word = prompt("Word: ", &mut stdin, &mut stdout)?;
        // Exit on empty input
        if word.is_empty() {
            return Ok(());
        }
        if let Some(id) = words.get(&word.to_lowercase()) {
            return Err(anyhow!(
                "A note with this word already exists. Please check note {}!",
                id
            ));
        }

        let translation = prompt("Translation: ", &mut stdin, &mut stdout)?;
        if let Some(id) = translations.get(&translation.to_lowercase()) {
            return Err(anyhow!(
                "A note with this translation already exists. Please check note {}!",
                id
            ));
        }

        let sentence = prompt("Sentence: ", &mut stdin, &mut stdout)?;
        let (note, _) = if sentence.is_empty() {
            let (note, cards) = study.compose_note(&word, &translation, source)?;
            writeln!(stdout, "  {}", plain_sentence(&note.sentence))?;
            writeln!(stdout, "  {}", note.sentence_translation)?;
            (note, cards)
        } else {
            let sentence_translation = prompt("Sentence translation: ", &mut stdin, &mut stdout)?;
            study.create_note(NoteDraft {
                word,
                translation,
                sentence,
                sentence_translation,
            })?
        };
        stdout.write_all(b"\n")?;
        stdout.flush()?;
        words.insert(note.word.to_lowercase(), note.id);
        translations.insert(note.translation.to_lowercase(), note.id);
    }
}

/// Maps lowercased words and translations to the ID of the note holding them.
fn build_lookup_tables(snapshot: &Snapshot) -> Result<(HashMap<String, u64>, HashMap<String, u64>)> {
    let mut words = HashMap::<String, u64>::new();
    let mut translations = HashMap::<String, u64>::new();
    for note in &snapshot.learning_notes {
        if let Some(j) = words.insert(note.word.to_lowercase(), note.id) {
            return Err(anyhow!(
                "The word {} of note {} is a duplicate! Please check note {}!",
                &note.word, note.id, j,
            ));
        }
        if let Some(j) = translations.insert(note.translation.to_lowercase(), note.id) {
            return Err(anyhow!(
                "The translation {} of note {} is a duplicate! Please check note {}!",
                &note.translation, note.id, j,
            ));
        }
    }
    Ok((words, translations))
}

#[cfg(test)]
fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc.with_ymd_and_hms(2025, 5, 10, 9, 0, 0).unwrap()
}

#[test]
fn test_add_notes_with_given_and_generated_sentences() {
    use crate::sentence::TemplateSentences;
    use crate::study::test_study;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let (study, _) = test_study(dir.path(), fixed_now());
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(
        "perro\ndog\nMi perro ladra.\nMy dog barks.\n\
    gato\ncat\n\n\
    \n",
    );
    let result = add_notes(
        &study,
        &TemplateSentences,
        &mut stdin,
        &mut stdout,
        (HashMap::new(), HashMap::new()),
    );
    assert!(result.is_ok());

    // Check prompts
    let stdout_vec = stdout.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&stdout_vec),
        "Word: Translation: Sentence: Sentence translation: \n\
    Word: Translation: Sentence:   El gato es importante.\n  The cat is important.\n\n\
    Word: "
    );

    // Check notes written to the store
    let snapshot = study.snapshot().unwrap();
    let sentences: Vec<&str> = snapshot
        .learning_notes
        .iter()
        .map(|n| n.sentence.as_str())
        .collect();
    assert_eq!(sentences, vec!["Mi *perro* ladra.", "El *gato* es importante."]);
    assert_eq!(snapshot.cards.len(), 4);
}

#[test]
fn test_cannot_add_duplicate_word_in_same_session() {
    use crate::sentence::TemplateSentences;
    use crate::study::test_study;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let (study, _) = test_study(dir.path(), fixed_now());
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(
        b"casa\nhouse\nMi casa.\nMy house.\n\
    Casa\nhome\n",
    );
    let result = add_notes(
        &study,
        &TemplateSentences,
        &mut stdin,
        &mut stdout,
        (HashMap::new(), HashMap::new()),
    );

    // Check prompts
    let stdout_vec = stdout.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&stdout_vec),
        "Word: Translation: Sentence: Sentence translation: \nWord: "
    );

    // Check result: error message with note ID
    assert_eq!(
        result.unwrap_err().to_string(),
        "A note with this word already exists. Please check note 1!"
    );
    assert_eq!(study.snapshot().unwrap().learning_notes.len(), 1);
}

#[test]
fn test_lookup_tables_reject_stored_duplicates() {
    use crate::models::NoteDraft;
    use crate::study::test_study;

    let dir = tempfile::tempdir().unwrap();
    let (study, _) = test_study(dir.path(), fixed_now());
    for (word, translation) in [("sol", "sun"), ("luna", "moon")] {
        study
            .create_note(NoteDraft {
                word: word.to_string(),
                translation: translation.to_string(),
                ..NoteDraft::default()
            })
            .unwrap();
    }
    let (words, translations) = build_lookup_tables(&study.snapshot().unwrap()).unwrap();
    assert_eq!(words.get("luna"), Some(&2));
    assert_eq!(translations.get("sun"), Some(&1));

    let mut snapshot = study.snapshot().unwrap();
    snapshot.learning_notes[1].translation = String::from("Sun");
    assert_eq!(
        build_lookup_tables(&snapshot).unwrap_err().to_string(),
        "The translation Sun of note 2 is a duplicate! Please check note 1!"
    );
}
