//! XML status report.
//!
//! Rewritten after every topology change so a web page (styled by
//! `status.xsl`) can show who is playing what:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <?xml-stylesheet type="text/xsl" href="status.xsl"?>
//! <prometheus usercount="3">
//! 	<game name="Monster Hunter Freedom Unite" usercount="3">
//! 		<group name="LOBBY01" usercount="2">
//! 			<user>Alice</user>
//! 			<user>Bob</user>
//! 		</group>
//! 		<group name="Groupless" usercount="1" />
//! 	</game>
//! </prometheus>
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use adhoc_core::TopologySnapshot;
use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct XmlStatusWriter {
    path: PathBuf,
}

impl XmlStatusWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        XmlStatusWriter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render and write `snapshot`, creating the parent directory if
    /// needed.
    pub fn write(&self, snapshot: &TopologySnapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, render(snapshot))
            .with_context(|| format!("writing status file {}", self.path.display()))
    }

    /// Move the writer onto its own task so file I/O never blocks the
    /// caller. Snapshots published into the returned channel are written
    /// on a blocking thread; when several arrive during one write only
    /// the newest is written next. The task ends once the sender is
    /// dropped and the last snapshot is on disk.
    pub fn spawn(self) -> (watch::Sender<TopologySnapshot>, JoinHandle<()>) {
        let (tx, mut rx) = watch::channel(TopologySnapshot::default());
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let writer = self.clone();
                match tokio::task::spawn_blocking(move || writer.write(&snapshot)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("status report not written: {:#}", e),
                    Err(e) => warn!("status writer failed: {}", e),
                }
            }
        });
        (tx, handle)
    }
}

pub fn render(snapshot: &TopologySnapshot) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<?xml-stylesheet type=\"text/xsl\" href=\"status.xsl\"?>\n");
    // Writing to a String cannot fail.
    let _ = writeln!(xml, "<prometheus usercount=\"{}\">", snapshot.user_count);

    for game in &snapshot.games {
        let _ = writeln!(
            xml,
            "\t<game name=\"{}\" usercount=\"{}\">",
            escape(&game.name),
            game.player_count
        );
        for group in &game.groups {
            let _ = writeln!(
                xml,
                "\t\t<group name=\"{}\" usercount=\"{}\">",
                escape(&group.name.to_string()),
                group.member_count()
            );
            for user in &group.members {
                let _ = writeln!(xml, "\t\t\t<user>{}</user>", escape(user));
            }
            xml.push_str("\t\t</group>\n");
        }
        let idle = game.groupless();
        if idle > 0 {
            let _ = writeln!(xml, "\t\t<group name=\"Groupless\" usercount=\"{}\" />", idle);
        }
        xml.push_str("\t</game>\n");
    }

    xml.push_str("</prometheus>");
    xml
}

/// Escape `"`, `<`, `>` and `&`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhoc_core::{GameSnapshot, GroupSnapshot};
    use adhoc_protocol::{GroupName, ProductCode};

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<Tom & "Jerry">"#), "&lt;Tom &amp; &quot;Jerry&quot;&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn renders_games_groups_and_groupless() {
        let snapshot = TopologySnapshot {
            user_count: 4,
            games: vec![GameSnapshot {
                product: ProductCode::parse("ULUS10391").unwrap(),
                name: "MH & Friends".to_string(),
                player_count: 3,
                groups: vec![GroupSnapshot {
                    name: GroupName::new("LOBBY01"),
                    members: vec!["Alice".to_string(), "<Bob>".to_string()],
                }],
            }],
        };

        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<?xml-stylesheet type=\"text/xsl\" href=\"status.xsl\"?>\n\
<prometheus usercount=\"4\">\n\
\t<game name=\"MH &amp; Friends\" usercount=\"3\">\n\
\t\t<group name=\"LOBBY01\" usercount=\"2\">\n\
\t\t\t<user>Alice</user>\n\
\t\t\t<user>&lt;Bob&gt;</user>\n\
\t\t</group>\n\
\t\t<group name=\"Groupless\" usercount=\"1\" />\n\
\t</game>\n\
</prometheus>";
        assert_eq!(render(&snapshot), expected);
    }

    #[test]
    fn empty_topology() {
        let xml = render(&TopologySnapshot::default());
        assert!(xml.ends_with("<prometheus usercount=\"0\">\n</prometheus>"));
    }

    #[tokio::test]
    async fn spawned_writer_flushes_latest_snapshot_on_close() {
        let dir = std::env::temp_dir().join(format!("adhoc-status-task-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("status.xml");
        let (tx, handle) = XmlStatusWriter::new(&path).spawn();

        for user_count in 1..=3 {
            tx.send(TopologySnapshot {
                user_count,
                games: Vec::new(),
            })
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<prometheus usercount=\"3\">"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("adhoc-status-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let writer = XmlStatusWriter::new(dir.join("www").join("status.xml"));
        writer.write(&TopologySnapshot::default()).unwrap();
        let text = fs::read_to_string(writer.path()).unwrap();
        assert!(text.starts_with("<?xml"));
        let _ = fs::remove_dir_all(&dir);
    }
}
