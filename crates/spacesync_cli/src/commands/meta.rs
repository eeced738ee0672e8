//! Shell completions and man pages.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

use crate::Cli;

const BIN_NAME: &str = "spacesync";

fn render_completions(shell: clap_complete::Shell, out: &mut impl Write) {
    clap_complete::generate(shell, &mut Cli::command(), BIN_NAME, out);
}

/// Man page for the binary, or for one of its subcommands as `spacesync-<name>`.
fn man_page(subcommand: Option<&str>) -> Option<Man> {
    let cli = Cli::command();
    match subcommand {
        None => Some(Man::new(cli)),
        Some(name) => cli
            .find_subcommand(name)
            .map(|sub| Man::new(sub.clone()).title(format!("{BIN_NAME}-{name}"))),
    }
}

/// Write `spacesync.1` plus one page per subcommand into `dir`.
fn write_man_pages(dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let subcommands: Vec<String> = Cli::command()
        .get_subcommands()
        .map(|sub| sub.get_name().to_string())
        .collect();
    let pages = std::iter::once((BIN_NAME.to_string(), man_page(None))).chain(
        subcommands
            .iter()
            .map(|name| (format!("{BIN_NAME}-{name}"), man_page(Some(name)))),
    );

    let mut written = Vec::new();
    for (title, page) in pages {
        let Some(page) = page else { continue };
        let path = dir.join(format!("{title}.1"));
        page.render(&mut File::create(&path)?)?;
        tracing::debug!(path = %path.display(), "Wrote man page");
        written.push(path);
    }
    Ok(written)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = io::stdout().lock();
    render_completions(shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(dir) => {
            let written = write_man_pages(&dir)?;
            println!("Wrote {} man pages to {}", written.len(), dir.display());
        }
        None => {
            let page = man_page(None).ok_or("missing man page")?;
            page.render(&mut io::stdout().lock())?;
        }
    }
    Ok(())
}
