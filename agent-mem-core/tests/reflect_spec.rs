mod common;

use agent_mem_core::reflect::{self, GatherOptions, Gathered};
use agent_mem_core::MemError;
use common::{context, utc, RecordingVcs};
#[macro_use(assert_eq)]
extern crate pretty_assertions;
use speculate2::speculate;

const REFLECTION: &str = "## Patterns Identified
- Small commits

## Stale Entries
- memory/decisions.md: Use MySQL

## Gaps Filled
- type: pattern
  text: Run migrations before deploy

## Lessons Learned
- text: Flaky CI
  problem: tests share a port
  resolution: bind to port 0

## Summary
Deploy pipeline is stable.
";

fn reflection_with_theme(date: &str, theme: &str) -> String {
    format!("---\ndate: {date}\ncommits_reviewed: 4\n---\n\n# Reflection: {date}\n\n## Themes\n- {theme}\n\n## Summary\nAll good on {date}.\n")
}

speculate! {
    before {
        let (dir, store) = context();
        let vcs = RecordingVcs::with_history(&["init: bootstrap context", "auto: remember", "auto: lesson"]);
    }

    describe "gather" {
        it "reports an empty window when there is no history" {
            let empty = RecordingVcs::new();
            let gathered = reflect::gather(&store, &empty, &GatherOptions::default(), utc("2026-03-10 12:00")).unwrap();
            assert_eq!(gathered, Gathered::Empty { since: None });
            assert!(reflect::read_state(&store).is_none());
        }

        it "renders the prompt and records the breadcrumb" {
            store.write("memory/notes.md", "# Notes\n\n- [2026-03-02 10:00] Cache is warm\n").unwrap();
            let gathered = reflect::gather(&store, &vcs, &GatherOptions::default(), utc("2026-03-10 12:00")).unwrap();
            let Gathered::Prompt { prompt, state } = gathered else {
                panic!("expected a prompt");
            };
            assert!(prompt.contains("(2 commits)"));
            assert!(prompt.contains("c003 | auto: lesson"));
            assert!(prompt.contains("memory/notes.md (1 entries"));
            assert!(prompt.contains("Last reflection: none (first reflection)"));
            assert!(!prompt.contains("COMPACTION MODE"));

            assert_eq!(state.commits_reviewed, 2);
            assert_eq!(state.since_ref.as_deref(), Some("c001"));
            assert_eq!(reflect::read_state(&store), Some(state));
        }

        it "starts the next window after the last gather" {
            reflect::gather(&store, &vcs, &GatherOptions::default(), utc("2026-03-10 12:00")).unwrap();
            let again = reflect::gather(&store, &vcs, &GatherOptions::default(), utc("2026-03-10 13:00")).unwrap();
            assert_eq!(again, Gathered::Empty { since: Some("c003".to_string()) });
        }

        it "adds compaction guidance on request" {
            let options = GatherOptions { compaction: true, ..GatherOptions::default() };
            let Gathered::Prompt { prompt, .. } = reflect::gather(&store, &vcs, &options, utc("2026-03-10 12:00")).unwrap() else {
                panic!("expected a prompt");
            };
            assert!(prompt.contains("═══ COMPACTION MODE ═══"));
        }

        it "honours an explicit window start" {
            let options = GatherOptions { since: Some("c002".to_string()), ..GatherOptions::default() };
            let Gathered::Prompt { state, .. } = reflect::gather(&store, &vcs, &options, utc("2026-03-10 12:00")).unwrap() else {
                panic!("expected a prompt");
            };
            assert_eq!(state.commits_reviewed, 1);
        }
    }

    describe "save" {
        before {
            store.write("memory/decisions.md", "---\ndescription: \"Decisions\"\n---\n\n# Decisions\n\n- [2025-01-01 10:00] Use MySQL\n").unwrap();
        }

        it "applies gaps, lessons and stale flags, then commits" {
            let outcome = reflect::save(&store, &vcs, REFLECTION, "main", utc("2026-03-10 12:00")).unwrap();
            assert_eq!(outcome.file, "reflections/2026-03-10.md");
            assert!(outcome.recognized);
            assert_eq!(
                outcome.gaps,
                vec![
                    ("memory/patterns.md".to_string(), "Run migrations before deploy".to_string()),
                    ("memory/lessons.md".to_string(), "Flaky CI".to_string()),
                ]
            );
            assert_eq!(outcome.stale_flagged, 1);
            assert_eq!(outcome.summary.as_deref(), Some("Deploy pipeline is stable."));
            assert_eq!(vcs.last_message().as_deref(), Some("reflect: Deploy pipeline is stable."));

            let lessons = store.load("memory/lessons.md").unwrap().unwrap();
            let fields = lessons.entries[0].lesson_fields().unwrap();
            assert_eq!(fields.resolution, "bind to port 0");

            let decisions = store.read("memory/decisions.md").unwrap().unwrap();
            assert!(decisions.contains("- [2025-01-01 10:00] Use MySQL\n- [2026-03-10 STALE]"));

            let saved = store.read(&outcome.file).unwrap().unwrap();
            assert!(saved.starts_with("---\ndate: 2026-03-10\n"));
            assert!(saved.contains("gaps_filled: 2\nstale_flagged: 1\n"));
            assert!(saved.contains("# Reflection: 2026-03-10\n\n## Patterns Identified"));
        }

        it "writes gaps into the active branch" {
            let outcome = reflect::save(&store, &vcs, REFLECTION, "try-redis", utc("2026-03-10 12:00")).unwrap();
            assert_eq!(outcome.gaps[0].0, "branches/try-redis/memory/patterns.md");
        }

        it "numbers same-day reflections" {
            reflect::save(&store, &vcs, REFLECTION, "main", utc("2026-03-10 12:00")).unwrap();
            let second = reflect::save(&store, &vcs, "## Summary\nSecond pass.\n", "main", utc("2026-03-10 18:00")).unwrap();
            assert_eq!(second.file, "reflections/2026-03-10-2.md");
            assert_eq!(
                reflect::reflection_files(&store).unwrap(),
                vec!["reflections/2026-03-10.md", "reflections/2026-03-10-2.md"]
            );
        }

        it "keeps unstructured text with a dated subject" {
            let outcome = reflect::save(&store, &vcs, "Just some thoughts.", "main", utc("2026-03-10 12:00")).unwrap();
            assert!(!outcome.recognized);
            assert!(outcome.gaps.is_empty());
            assert_eq!(vcs.last_message().as_deref(), Some("reflect: 2026-03-10"));
        }

        it "rejects empty text" {
            assert!(matches!(
                reflect::save(&store, &vcs, "  \n", "main", utc("2026-03-10 12:00")),
                Err(MemError::InvalidInput(_))
            ));
        }

        it "moves the next window past the saved commit" {
            reflect::save(&store, &vcs, REFLECTION, "main", utc("2026-03-10 12:00")).unwrap();
            let since = reflect::resolve_since(&store, &vcs, None).unwrap();
            assert_eq!(since.as_deref(), Some("c003"));
        }
    }

    describe "history" {
        it "lists newest first and finds recurring themes" {
            store.write("reflections/2026-03-01.md", &reflection_with_theme("2026-03-01", "Testing discipline")).unwrap();
            store.write("reflections/2026-03-05.md", &reflection_with_theme("2026-03-05", "testing again")).unwrap();
            store.write("reflections/2026-03-09.md", &reflection_with_theme("2026-03-09", "More testing")).unwrap();

            let history = reflect::history(&store, 5).unwrap();
            assert_eq!(history.total, 3);
            assert_eq!(history.reflections[0].date, "2026-03-09");
            assert_eq!(history.reflections[0].commits_reviewed, Some(4));
            assert_eq!(history.reflections[0].summary.as_deref(), Some("All good on 2026-03-09."));
            assert_eq!(history.recurring_themes, vec![("testing".to_string(), 3)]);

            let limited = reflect::history(&store, 2).unwrap();
            assert_eq!(limited.reflections.len(), 2);
            assert_eq!(limited.total, 3);
            assert!(limited.recurring_themes.is_empty());
        }
    }
}
