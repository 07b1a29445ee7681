use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::discretization::mesh::Mesh;
use crate::iteration::IterationRecord;

/// Write data to CSV file with headers
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = File::create(path)?;

    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);

    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| {
                if i < col.len() {
                    format!("{:.15e}", col[i])
                } else {
                    String::new()
                }
            })
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }

    Ok(())
}

/// Cell centroids followed by one scalar-flux column per group.
pub fn write_flux<P: AsRef<Path>>(path: P, mesh: &Mesh, moments: &[DVector<f64>]) -> io::Result<()> {
    if let Some(g) = moments.iter().position(|m| m.len() != mesh.n_cells()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Group {} flux has {} values for {} cells",
                g,
                moments[g].len(),
                mesh.n_cells()
            ),
        ));
    }

    let names: Vec<String> = (0..moments.len()).map(|g| format!("phi_{g}")).collect();
    let mut headers = vec!["x", "y", "z"];
    headers.extend(names.iter().map(String::as_str));

    let mut data: Vec<Vec<f64>> = (0..3)
        .map(|a| mesh.cells.iter().map(|c| c.centroid[a]).collect())
        .collect();
    data.extend(moments.iter().map(|m| m.iter().copied().collect::<Vec<f64>>()));

    write_csv(path, &headers, &data)
}

/// Power iteration history, one row per outer iteration.
pub fn write_history<P: AsRef<Path>>(path: P, history: &[IterationRecord]) -> io::Result<()> {
    let column = |f: fn(&IterationRecord) -> f64| history.iter().map(f).collect::<Vec<f64>>();
    write_csv(
        path,
        &["iteration", "keff", "err_k", "err_phi", "sweeps"],
        &[
            column(|r| r.iteration as f64),
            column(|r| r.keff),
            column(|r| r.err_k),
            column(|r| r.err_phi),
            column(|r| r.sweeps as f64),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_slab_mesh;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dgtrans_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_write_csv() {
        let path = temp_path("table.csv");
        let headers = &["x", "y", "z"];
        let data = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];

        write_csv(&path, headers, &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("x,y,z"));
        assert_eq!(content.lines().count(), 4);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_flux() {
        let path = temp_path("flux.csv");
        let mesh = create_slab_mesh(&[0.0, 1.0, 2.0], 1.0);
        let moments = vec![DVector::from_vec(vec![1.0, 2.0]), DVector::from_vec(vec![3.0, 4.0])];

        write_flux(&path, &mesh, &moments).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("x,y,z,phi_0,phi_1"));
        assert_eq!(lines.count(), 2);
        fs::remove_file(&path).ok();

        let short = vec![DVector::from_vec(vec![1.0])];
        assert!(write_flux(&path, &mesh, &short).is_err());
    }

    #[test]
    fn test_write_history() {
        let path = temp_path("history.csv");
        let record = IterationRecord {
            iteration: 1,
            keff: 1.2,
            err_k: 0.2,
            err_phi: 0.1,
            sweeps: 3,
            multigroup_converged: true,
        };

        write_history(&path, &[record, IterationRecord { iteration: 2, ..record }]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("iteration,keff,err_k,err_phi,sweeps"));
        assert_eq!(content.lines().count(), 3);
        fs::remove_file(&path).ok();
    }
}
