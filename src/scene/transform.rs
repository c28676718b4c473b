use glam::{Mat3, Mat4, Quat, Vec3};

/// Transform component
///
/// Holds the TRS properties of a node plus its pivot. The composed local
/// matrix lives on the [`Node`](crate::scene::Node) itself; this type only
/// knows how to build and decompose it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Point (in unscaled local space) that rotation and scale pivot around.
    pub pivot: Vec3,
}

impl Transform {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            pivot: Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    /// Composes the local matrix for these properties.
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        calculate_transform_matrix(self.position, self.scale, self.pivot, self.rotation)
    }

    // ========================================================================
    // Decomposition
    // ========================================================================

    /// Rebuilds the TRS properties from a local matrix.
    ///
    /// Zero scale components are coerced to 1 so that the rotation stays
    /// recoverable, and the pivot is cleared since a plain matrix carries none.
    /// Shear is lost.
    #[must_use]
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = matrix.w_axis.truncate();

        let mut axes = [
            matrix.x_axis.truncate(),
            matrix.y_axis.truncate(),
            matrix.z_axis.truncate(),
        ];
        let mut scale = Vec3::ONE;
        for (i, axis) in axes.iter_mut().enumerate() {
            let len = axis.length();
            if len > f32::EPSILON {
                scale[i] = len;
                *axis /= len;
            }
        }

        // A negative determinant means one mirrored axis; fold it into X.
        let basis = Mat3::from_cols(axes[0], axes[1], axes[2]);
        let basis = if basis.determinant() < 0.0 {
            scale.x = -scale.x;
            Mat3::from_cols(-axes[0], axes[1], axes[2])
        } else {
            basis
        };

        let rotation = Quat::from_mat3(&basis);
        let rotation = if rotation.is_finite() && rotation.length_squared() > f32::EPSILON {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };

        Self {
            position,
            rotation,
            scale,
            pivot: Vec3::ZERO,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes a local matrix from TRS + pivot.
///
/// Application order on a point: scale, pivot offset (`-pivot * scale`),
/// rotation, translation. Pure: callers that store the result on a node must
/// mark it dirty themselves.
#[must_use]
pub fn calculate_transform_matrix(position: Vec3, scale: Vec3, pivot: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_quat(rotation)
        * Mat4::from_translation(-pivot * scale)
        * Mat4::from_scale(scale)
}
