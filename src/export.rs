use std::io::Write;

use crate::session::SessionRecord;

/// Write records as CSV (`id,time,blocks,timestamp,type`), oldest first.
///
/// Stores hand records back newest first; the export reads better in the
/// order the sessions happened.
pub fn write_csv<W: Write>(records: &[SessionRecord], out: W) -> csv::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut written = 0;
    for record in records.iter().rev() {
        writer.serialize(record)?;
        written += 1;
    }
    if written == 0 {
        writer.write_record(["id", "time", "blocks", "timestamp", "type"])?;
    }
    writer.flush()?;
    Ok(written)
}
