use crate::types::{Prediction, HISTORY_SIZE};

/// Buffer circular de capacidad fija con las últimas N predicciones.
/// Se reserva una sola vez; `push` nunca realoca.
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    slots: Box<[Option<Prediction>]>,
    /// Posición de la predicción más antigua
    head: usize,
    len: usize,
}

impl PredictionHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    /// Capacidad mínima 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Añade una predicción; si el buffer está lleno devuelve la más antigua (FIFO)
    pub fn push(&mut self, prediction: Prediction) -> Option<Prediction> {
        let capacity = self.capacity();

        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(prediction);
            self.len += 1;
            return None;
        }

        let evicted = self.slots[self.head].replace(prediction);
        self.head = (self.head + 1) % capacity;
        evicted
    }

    /// Recorre el historial de la más antigua a la más reciente
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Prediction> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    pub fn newest(&self) -> Option<&Prediction> {
        self.iter().next_back()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Cuántas veces aparece `label` en el historial
    pub fn count(&self, label: &str) -> usize {
        self.iter().filter(|p| p.label == label).count()
    }

    /// Media aritmética de todas las confianzas (no solo de la etiqueta ganadora)
    pub fn mean_confidence(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let sum: f32 = self.iter().map(|p| p.confidence).sum();
        Some(sum / self.len as f32)
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(history: &PredictionHistory) -> Vec<String> {
        history.iter().map(|p| p.label.clone()).collect()
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = PredictionHistory::with_capacity(5);
        for i in 0..5 {
            assert!(history.push(Prediction::new(format!("g{}", i), 0.5)).is_none());
        }
        assert!(history.is_full());

        let evicted = history.push(Prediction::new("g5", 0.5)).unwrap();
        assert_eq!(evicted.label, "g0");
        assert_eq!(labels(&history), vec!["g1", "g2", "g3", "g4", "g5"]);
    }

    #[test]
    fn test_oldest_always_missing_after_wraparound() {
        let mut history = PredictionHistory::with_capacity(3);
        for i in 0..10 {
            history.push(Prediction::new(format!("g{}", i), 0.5));
            if i >= 3 {
                assert_eq!(history.count(&format!("g{}", i - 3)), 0);
                assert_eq!(history.len(), 3);
            }
        }
        assert_eq!(labels(&history), vec!["g7", "g8", "g9"]);
        assert_eq!(history.newest().unwrap().label, "g9");
    }

    #[test]
    fn test_mean_confidence() {
        let mut history = PredictionHistory::new();
        assert!(history.mean_confidence().is_none());

        history.push(Prediction::new("a", 0.9));
        history.push(Prediction::new("a", 0.9));
        history.push(Prediction::new("b", 0.6));
        let mean = history.mean_confidence().unwrap();
        assert!((mean - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_clear() {
        let mut history = PredictionHistory::with_capacity(2);
        history.push(Prediction::new("a", 0.9));
        history.push(Prediction::new("b", 0.9));
        history.push(Prediction::new("c", 0.9));
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.iter().count(), 0);
        history.push(Prediction::new("d", 0.1));
        assert_eq!(labels(&history), vec!["d"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = PredictionHistory::with_capacity(0);
        assert_eq!(history.capacity(), 1);
        history.push(Prediction::new("a", 0.9));
        let evicted = history.push(Prediction::new("b", 0.9));
        assert_eq!(evicted.unwrap().label, "a");
    }
}
