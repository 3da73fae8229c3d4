// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Fill in the `arguments` line of a submit description.

HTCondor's "new syntax" for `arguments` is a double-quoted string of
whitespace-separated words. Within it:

- a literal double quote is written as `""`;
- a word containing whitespace or a single quote is wrapped in single
  quotes, with each literal single quote written as `''`.

The submit description is rendered with a fixed placeholder line (see
[`submitfile::ARGS_PLACEHOLDER_LINE`](../submitfile/constant.ARGS_PLACEHOLDER_LINE.html))
and the real argument vector, `<wrapper> -- <command...>`, is substituted
here.

*/

use errors::JobError;
use failure::{Error, ResultExt};
use itertools::Itertools;
use std::fs;
use std::path::Path;
use submitfile::ARGS_PLACEHOLDER_LINE;


/// Separates the wrapper script from the user's command.
pub const SEPARATOR: &str = "--";


/// Escape a single word for the new-syntax `arguments` line.
///
/// Note that a word with a double quote but no whitespace or single quote
/// is not wrapped: `say"hi"` becomes `say""hi""`.
pub fn escape_argument(word: &str) -> String {
    let doubled = word.replace('"', "\"\"");

    if doubled.contains(|c: char| c == ' ' || c == '\t' || c == '\'') {
        format!("'{}'", doubled.replace('\'', "''"))
    } else {
        doubled
    }
}


/// Build the complete `arguments = "..."` line for a word sequence.
pub fn arguments_line<S: AsRef<str>>(words: &[S]) -> String {
    format!("arguments = \"{}\"", words.iter().map(|w| escape_argument(w.as_ref())).join(" "))
}


/// The argument vector HTCondor passes to `/bin/bash`.
pub fn wrapper_argv<S: AsRef<str>>(wrapper: &str, command: &[S]) -> Vec<String> {
    let mut argv = Vec::with_capacity(command.len() + 2);
    argv.push(wrapper.to_owned());
    argv.push(SEPARATOR.to_owned());
    argv.extend(command.iter().map(|w| w.as_ref().to_owned()));
    argv
}


/// Replace the placeholder line of a rendered submit description.
///
/// Only a line consisting exactly of the placeholder is replaced; every
/// other line is left alone. `origin` names the description in the error
/// raised when the placeholder is missing.
pub fn inject<S: AsRef<str>>(text: &str, words: &[S], origin: &str) -> Result<String, JobError> {
    let mut found = false;
    let mut out = String::with_capacity(text.len() + 64);

    for line in text.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        if !found && body == ARGS_PLACEHOLDER_LINE {
            out.push_str(&arguments_line(words));
            found = true;
        } else {
            out.push_str(body);
        }

        out.push_str(ending);
    }

    if !found {
        return Err(JobError::MissingPlaceholder(origin.to_owned()));
    }

    Ok(out)
}


/// Patch a submit description on disk with `<wrapper> -- <command...>`.
pub fn patch_submit_file<S: AsRef<str>>(submit_file: &Path, wrapper: &Path, command: &[S]) -> Result<(), Error> {
    let wrapper = wrapper.to_str()
        .ok_or_else(|| format_err!("cannot stringify wrapper path {}", wrapper.display()))?;

    let text = fs::read_to_string(submit_file)
        .context(format!("failed to read submit file {}", submit_file.display()))?;
    let patched = inject(&text, &wrapper_argv(wrapper, command), &submit_file.display().to_string())?;
    fs::write(submit_file, patched)
        .context(format!("failed to write submit file {}", submit_file.display()))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile;

    /// Split an `arguments` value back into words, following HTCondor's
    /// new-syntax grammar.
    fn parse_arguments(line: &str) -> Vec<String> {
        let value = line.trim_start_matches("arguments = ");
        assert!(value.starts_with('"') && value.ends_with('"'));
        let chars: Vec<char> = value[1..value.len() - 1].chars().collect();

        let mut words = Vec::new();
        let mut cur = String::new();
        let mut in_word = false;
        let mut quoted = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).cloned();

            if c == '"' && next == Some('"') {
                cur.push('"');
                in_word = true;
                i += 2;
                continue;
            }

            if c == '\'' {
                if quoted && next == Some('\'') {
                    cur.push('\'');
                    i += 2;
                    continue;
                }
                quoted = !quoted;
                in_word = true;
            } else if !quoted && (c == ' ' || c == '\t') {
                if in_word {
                    words.push(cur.clone());
                    cur.clear();
                    in_word = false;
                }
            } else {
                cur.push(c);
                in_word = true;
            }

            i += 1;
        }

        if in_word {
            words.push(cur);
        }

        words
    }

    #[test]
    fn plain_words_are_untouched() {
        assert_eq!(escape_argument("hello"), "hello");
        assert_eq!(escape_argument("/usr/local/bin/python"), "/usr/local/bin/python");
        assert_eq!(escape_argument("--"), "--");
        assert_eq!(escape_argument("--lr=1e-4"), "--lr=1e-4");
    }

    #[test]
    fn whitespace_forces_single_quotes() {
        assert_eq!(escape_argument("/my dir/run.sh"), "'/my dir/run.sh'");
        assert_eq!(escape_argument("a\tb"), "'a\tb'");
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape_argument("say \"hi\""), "'say \"\"hi\"\"'");
        assert_eq!(escape_argument("it's"), "'it''s'");
    }

    #[test]
    fn bare_double_quote_is_not_wrapped() {
        assert_eq!(escape_argument("say\"hi\""), "say\"\"hi\"\"");
    }

    #[test]
    fn full_line() {
        let argv = wrapper_argv("/home/user/run.sh", &["echo", "say \"hi\""]);
        assert_eq!(arguments_line(&argv),
                   "arguments = \"/home/user/run.sh -- echo 'say \"\"hi\"\"'\"");
    }

    #[test]
    fn wrapper_path_with_spaces() {
        let argv = wrapper_argv("/my dir/runs/run.sh", &["echo", "hello"]);
        assert_eq!(arguments_line(&argv), "arguments = \"'/my dir/runs/run.sh' -- echo hello\"");
    }

    #[test]
    fn lines_parse_back_to_the_same_words() {
        let words = vec![
            "/my dir/run.sh",
            "--",
            "python",
            "-c",
            "print(\"it's fine\")",
            "two  spaces",
            "tab\there",
            "'quoted'",
        ];

        let line = arguments_line(&words);
        let expected: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        assert_eq!(parse_arguments(&line), expected);
    }

    #[test]
    fn inject_replaces_only_the_placeholder() {
        let text = "universe = vanilla\narguments = __ARGS_PLACEHOLDER__\ngetenv = True\n";
        let argv = wrapper_argv("/home/user/run.sh", &["python", "test.py"]);
        let out = inject(text, &argv, "job.sub").unwrap();
        assert_eq!(out, "universe = vanilla\n\
                         arguments = \"/home/user/run.sh -- python test.py\"\n\
                         getenv = True\n");
    }

    #[test]
    fn inject_without_trailing_newline() {
        let out = inject("arguments = __ARGS_PLACEHOLDER__", &["a"], "job.sub").unwrap();
        assert_eq!(out, "arguments = \"a\"");
    }

    #[test]
    fn missing_placeholder_is_fatal() {
        let text = "universe = vanilla\narguments = \"already filled\"\n";
        match inject(text, &["a"], "job.sub") {
            Err(JobError::MissingPlaceholder(ref origin)) => assert_eq!(origin, "job.sub"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn patch_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let job_sub = dir.path().join("job.sub");
        fs::write(&job_sub, "arguments = __ARGS_PLACEHOLDER__\n").unwrap();

        patch_submit_file(&job_sub, Path::new("/home/user/runs/run.sh"), &["python", "train.py"]).unwrap();
        assert_eq!(fs::read_to_string(&job_sub).unwrap(),
                   "arguments = \"/home/user/runs/run.sh -- python train.py\"\n");

        // a second pass has nothing left to replace
        assert!(patch_submit_file(&job_sub, Path::new("/x/run.sh"), &["true"]).is_err());
    }
}
