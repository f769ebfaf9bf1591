//! Input format frontends, each producing a [`Device`](crate::model::Device)

pub(crate) mod svd;
