use egui_extras::{Column, TableBuilder};
use log::{info, warn};
use polars::prelude::*;
use rfd::FileDialog;

pub fn display_dataframe(df: &DataFrame, ui: &mut egui::Ui) {
    let nr_cols = df.width();
    let nr_rows = df.height();
    let cols = &df.get_column_names();

    TableBuilder::new(ui)
        .column(Column::auto())
        .columns(Column::auto().clip(true), nr_cols)
        .striped(true)
        .resizable(true)
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.label("Row");
            });
            for head in cols {
                header.col(|ui| {
                    ui.strong(head.to_string());
                });
            }
        })
        .body(|body| {
            body.rows(18.0, nr_rows, |mut row| {
                let row_index = row.index();
                row.col(|ui| {
                    ui.label(format!("{}", row_index));
                });
                for col in cols {
                    row.col(|ui| {
                        if let Ok(column) = &df.column(col) {
                            if let Ok(value) = column.get(row_index) {
                                ui.label(format!("{}", value).replace('"', ""));
                            }
                        }
                    });
                }
            });
        });
}

/// Asks where to save `bytes` and writes them there. Returns the error text on failure.
pub fn save_download(file_name: &str, extension: &str, bytes: &[u8]) -> Result<(), String> {
    let Some(path) = FileDialog::new()
        .set_file_name(file_name)
        .add_filter(extension.to_uppercase(), &[extension])
        .save_file()
    else {
        return Ok(());
    };
    match std::fs::write(&path, bytes) {
        Ok(()) => {
            info!("saved {}", path.display());
            Ok(())
        }
        Err(e) => {
            warn!("could not save {}: {e}", path.display());
            Err(format!("could not save {}: {e}", path.display()))
        }
    }
}
