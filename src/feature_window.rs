use std::collections::VecDeque;

use crate::types::FeatureVector;

/// Últimos T vectores de una mano para modelos secuenciales
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    frames: VecDeque<FeatureVector>,
    len: usize,
}

impl FeatureWindow {
    pub fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            frames: VecDeque::with_capacity(len),
            len,
        }
    }

    pub fn push(&mut self, features: FeatureVector) {
        if self.frames.len() == self.len {
            self.frames.pop_front();
        }
        self.frames.push_back(features);
    }

    pub fn is_ready(&self) -> bool {
        self.frames.len() == self.len
    }

    /// Ventana completa en orden cronológico, o None si aún faltan frames
    pub fn window(&mut self) -> Option<&[FeatureVector]> {
        if !self.is_ready() {
            return None;
        }
        Some(self.frames.make_contiguous())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
