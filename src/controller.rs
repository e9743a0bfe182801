//! Editing state shared by the interactive front-ends: rows of the current
//! axis, rows saved per axis and the debounced live preview.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::api::{Axis, DiscretizeAllRequest, FunctionRow, ResolutionFields};
use crate::discretize::Segment;
use crate::error::{Error, Result};

pub const NOT_READY_MESSAGE: &str = "Please fill in both function+domain for X, Y, and Z.";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Incomplete,
}

impl Readiness {
    pub fn message(self) -> Option<&'static str> {
        match self {
            Readiness::Ready => None,
            Readiness::Incomplete => Some(NOT_READY_MESSAGE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    axis: Axis,
    rows: Vec<FunctionRow>,
    saved: [Vec<FunctionRow>; 3],
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            axis: Axis::X,
            rows: vec![FunctionRow::default()],
            saved: Default::default(),
        }
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Rows being edited, including incomplete ones
    pub fn rows(&self) -> &[FunctionRow] {
        &self.rows
    }

    pub fn saved(&self, axis: Axis) -> &[FunctionRow] {
        &self.saved[axis.index()]
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i < self.rows.len() {
            Ok(())
        } else {
            Err(Error::validation(format!("Row {} does not exist", i + 1)))
        }
    }

    pub fn add_row(&mut self) {
        self.rows.push(FunctionRow::default());
    }

    /// The last remaining row is cleared instead of removed
    pub fn remove_row(&mut self, i: usize) -> Result<()> {
        self.check_index(i)?;
        if self.rows.len() == 1 {
            self.rows[0] = FunctionRow::default();
        } else {
            self.rows.remove(i);
        }
        Ok(())
    }

    pub fn edit_row(
        &mut self,
        i: usize,
        function: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<()> {
        self.check_index(i)?;
        self.rows[i] = FunctionRow::new(function, domain);
        Ok(())
    }

    /// Complete rows of the current axis, trimmed
    pub fn current_rows(&self) -> Vec<FunctionRow> {
        self.rows
            .iter()
            .filter(|r| r.is_complete())
            .map(FunctionRow::trimmed)
            .collect()
    }

    pub fn save_current(&mut self) {
        self.saved[self.axis.index()] = self.current_rows();
    }

    pub fn select_axis(&mut self, axis: Axis) {
        self.save_current();
        self.axis = axis;

        let saved = &self.saved[axis.index()];
        self.rows = if saved.is_empty() {
            vec![FunctionRow::default()]
        } else {
            saved.clone()
        };
    }

    pub fn discretize_readiness(&self) -> Readiness {
        let ok = self
            .saved
            .iter()
            .all(|rows| !rows.is_empty() && rows.iter().all(FunctionRow::is_complete));
        if ok {
            Readiness::Ready
        } else {
            Readiness::Incomplete
        }
    }

    pub fn discretize_all_request(&self, resolution: ResolutionFields) -> DiscretizeAllRequest {
        DiscretizeAllRequest {
            x: self.saved(Axis::X).to_vec(),
            y: self.saved(Axis::Y).to_vec(),
            z: self.saved(Axis::Z).to_vec(),
            resolution,
        }
    }
}

pub type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs `action` once after a burst of triggers has been quiet for `delay`
pub struct Debouncer {
    delay: Duration,
    action: Action,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration, action: Action) -> Self {
        Self {
            delay,
            action,
            pending: None,
        }
    }

    /// Stops a timer that has not fired yet. A run already started is left
    /// to finish in its own task.
    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn trigger(&mut self) {
        self.cancel();

        let delay = self.delay;
        let action = self.action.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action());
        }));
    }

    /// Drop the pending timer and run now, waiting for the run to finish
    pub async fn flush(&mut self) {
        self.cancel();
        if let Err(e) = tokio::spawn((self.action)()).await {
            tracing::error!("Debounced action failed: {}", e);
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Text shown for a `/discretize` result
pub fn format_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let angles = s
                .angles
                .iter()
                .map(|a| format!("{a:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Piece {}: domain={}, dt={:.6}s, samples={}\n{}",
                i + 1,
                s.domain,
                s.dt,
                s.angles.len(),
                angles
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[test]
    fn test_rows_editing() {
        let mut ws = Workspace::new();
        assert_eq!(ws.rows().len(), 1);

        ws.edit_row(0, "x", "0,1").unwrap();
        ws.add_row();
        ws.edit_row(1, " 2 ", " 1,2 ").unwrap();
        ws.add_row();
        assert_eq!(
            ws.current_rows(),
            vec![FunctionRow::new("x", "0,1"), FunctionRow::new("2", "1,2")]
        );

        ws.remove_row(0).unwrap();
        ws.remove_row(0).unwrap();
        assert_eq!(ws.rows().len(), 1);
        ws.edit_row(0, "x", "0,1").unwrap();
        ws.remove_row(0).unwrap();
        assert_eq!(ws.rows(), &[FunctionRow::default()]);

        assert!(ws.remove_row(3).is_err());
        assert!(ws.edit_row(1, "x", "0,1").is_err());
    }

    #[test]
    fn test_axis_switch_keeps_rows() {
        let mut ws = Workspace::new();
        ws.edit_row(0, "x", "0,1").unwrap();
        ws.add_row();

        ws.select_axis(Axis::Y);
        assert_eq!(ws.axis(), Axis::Y);
        assert_eq!(ws.rows(), &[FunctionRow::default()]);
        assert_eq!(ws.saved(Axis::X), &[FunctionRow::new("x", "0,1")]);

        ws.select_axis(Axis::X);
        assert_eq!(ws.rows(), &[FunctionRow::new("x", "0,1")]);
    }

    #[test]
    fn test_readiness() {
        let mut ws = Workspace::new();
        assert_eq!(ws.discretize_readiness(), Readiness::Incomplete);
        assert_eq!(
            ws.discretize_readiness().message(),
            Some("Please fill in both function+domain for X, Y, and Z.")
        );

        for axis in [Axis::X, Axis::Y, Axis::Z] {
            ws.select_axis(axis);
            ws.edit_row(0, "x", "0,1").unwrap();
        }
        assert_eq!(ws.discretize_readiness(), Readiness::Incomplete);

        ws.save_current();
        assert_eq!(ws.discretize_readiness(), Readiness::Ready);
        assert_eq!(ws.discretize_readiness().message(), None);

        let req = ws.discretize_all_request(ResolutionFields::default());
        assert_eq!(req.rows(Axis::Z), &[FunctionRow::new("x", "0,1")]);

        ws.edit_row(0, "", "0,1").unwrap();
        ws.save_current();
        assert_eq!(ws.discretize_readiness(), Readiness::Incomplete);
    }

    #[test]
    fn test_format_segments() {
        let segments = vec![
            Segment {
                domain: "0,1".to_owned(),
                dt: 0.5,
                angles: vec![0.0, 0.5, 1.0],
            },
            Segment {
                domain: "1,2".to_owned(),
                dt: 1.0,
                angles: vec![2.0, 2.0],
            },
        ];
        assert_eq!(
            format_segments(&segments),
            "Piece 1: domain=0,1, dt=0.500000s, samples=3\n0.000, 0.500, 1.000\n\n\
             Piece 2: domain=1,2, dt=1.000000s, samples=2\n2.000, 2.000"
        );
        assert_eq!(format_segments(&[]), "");
    }

    fn counting_action() -> (Action, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let action: Action = Arc::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });
        (action, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_burst_fires_once() {
        let (action, count) = counting_action();
        let mut debouncer = Debouncer::new(DEFAULT_DEBOUNCE, action);

        for _ in 0..5 {
            debouncer.trigger();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // 100 ms after the last trigger already passed
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_action_survives_retrigger() {
        let completed = Arc::new(AtomicUsize::new(0));
        let c = completed.clone();
        let action: Action = Arc::new(move || {
            let c = c.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });
        let mut debouncer = Debouncer::new(DEFAULT_DEBOUNCE, action);

        debouncer.trigger();
        // the first run starts at 500 ms and is still going
        tokio::time::sleep(Duration::from_millis(700)).await;
        debouncer.trigger();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_action_survives_drop() {
        let completed = Arc::new(AtomicUsize::new(0));
        let c = completed.clone();
        let action: Action = Arc::new(move || {
            let c = c.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        let mut debouncer = Debouncer::new(DEFAULT_DEBOUNCE, action);
        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(600)).await;
        drop(debouncer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_now() {
        let (action, count) = counting_action();
        let mut debouncer = Debouncer::new(DEFAULT_DEBOUNCE, action);

        debouncer.trigger();
        debouncer.flush().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
