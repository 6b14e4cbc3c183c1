use quizlink_core::{GameMode, SessionEffect, SessionOutcome, Verdict, ANSWER_WINDOW};
use quizlink_p2p::{RuntimeHandle, UiTrigger};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Line-driven presentation loop: renders forwarded session effects and
/// feeds stdin input back as triggers. Returns the outcome once the
/// session finishes.
pub async fn drive(mut handle: RuntimeHandle) -> Option<SessionOutcome> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut outcome = None;

    loop {
        tokio::select! {
            effect = handle.effects.recv() => {
                let Some(effect) = effect else { break };
                if let Some(done) = render(&handle, effect) {
                    outcome = Some(done);
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(input)) => {
                        if let Some(trigger) = parse_input(input.trim()) {
                            if handle.triggers.send(trigger).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) | Err(_) => {
                        // stdin is gone; concede and wait for the finish
                        stdin_open = false;
                        let _ = handle.triggers.send(UiTrigger::Quit).await;
                    }
                }
            }
        }
    }

    outcome
}

fn render(handle: &RuntimeHandle, effect: SessionEffect) -> Option<SessionOutcome> {
    match effect {
        SessionEffect::PresentQuestion { index, question } => {
            let total = handle.snapshots.borrow().total_questions;
            println!();
            println!("Question {}/{}: {}", index + 1, total, question.text());
            for (i, option) in question.options().iter().enumerate() {
                println!("  {}) {}", i + 1, option);
            }
            println!(
                "Answer 1-4 within {}s ('e <name>' to emote, 'q' to quit)",
                ANSWER_WINDOW.as_secs()
            );
        }
        SessionEffect::ShowWaiting => {
            let opponent = handle.snapshots.borrow().opponent_name.clone();
            println!("Waiting for {opponent}...");
        }
        SessionEffect::LocalAnswerRecorded(answer) => {
            if answer.selected_option == 0 {
                println!("Time's up!");
            } else if answer.is_correct {
                println!("Correct!");
            } else {
                println!("Wrong.");
            }
        }
        SessionEffect::RemoteAnswerRecorded(answer) => {
            let opponent = handle.snapshots.borrow().opponent_name.clone();
            println!(
                "{opponent} answered question {} {}",
                answer.question_index + 1,
                if answer.is_correct { "correctly" } else { "wrong" }
            );
        }
        SessionEffect::OpponentNamed(name) => {
            println!("Playing against {name}");
        }
        SessionEffect::LocalEmote(name) => {
            println!("You: [{name}]");
        }
        SessionEffect::OpponentEmote(name) => {
            let opponent = handle.snapshots.borrow().opponent_name.clone();
            println!("{opponent}: [{name}]");
        }
        SessionEffect::Finished(outcome) => {
            print_summary(&outcome);
            return Some(outcome);
        }
        // Internal effects are consumed by the runtime and never reach us
        _ => {}
    }
    None
}

fn print_summary(outcome: &SessionOutcome) {
    println!();
    match outcome.mode {
        GameMode::Single => {
            println!("Game over. Final score: {}", outcome.local_score);
        }
        GameMode::Versus => {
            println!(
                "Game over. You {} {} : {}",
                match outcome.verdict {
                    Verdict::Win => "win!",
                    Verdict::Draw => "draw.",
                    Verdict::Loss => "lose.",
                },
                outcome.local_score,
                outcome.remote_score.unwrap_or(0)
            );
        }
    }
}

fn parse_input(input: &str) -> Option<UiTrigger> {
    match input {
        "" => None,
        "q" | "quit" => Some(UiTrigger::Quit),
        "1" | "2" | "3" | "4" => input.parse().ok().map(UiTrigger::Answer),
        _ => {
            if let Some(id) = input.strip_prefix("e ") {
                Some(UiTrigger::Emote(id.trim().to_string()))
            } else {
                println!("Enter 1-4, 'e <name>', or 'q'.");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answers() {
        assert_eq!(parse_input("1"), Some(UiTrigger::Answer(1)));
        assert_eq!(parse_input("4"), Some(UiTrigger::Answer(4)));
        assert_eq!(parse_input("5"), None);
        assert_eq!(parse_input("0"), None);
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(parse_input("q"), Some(UiTrigger::Quit));
        assert_eq!(parse_input("quit"), Some(UiTrigger::Quit));
    }

    #[test]
    fn test_parse_emote() {
        assert_eq!(
            parse_input("e laugh"),
            Some(UiTrigger::Emote("laugh".to_string()))
        );
    }

    #[test]
    fn test_parse_noise() {
        assert_eq!(parse_input(""), None);
        assert_eq!(parse_input("hello"), None);
    }
}
